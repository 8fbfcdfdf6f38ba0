use ans_expenses::db::ExpenseDatabase;
use ans_expenses::etl::{files, importer};
use ans_expenses::{EtlEngine, ExpensePipeline, LocalStorage, TomlConfig};
use httpmock::prelude::*;
use httpmock::Mock;
use std::io::{Cursor, Write};
use tempfile::TempDir;
use zip::write::{FileOptions, ZipWriter};

const Q1_STATEMENT: &[u8] = b"DATA;REG_ANS;CD_CONTA_CONTABIL;DESCRICAO;VL_SALDO_INICIAL;VL_SALDO_FINAL\n\
2024-01-01;316458;411;EVENTOS CONHECIDOS OU AVISADOS;0;1.000,00\n\
2024-01-01;419761;411;SINISTROS RETIDOS;0;500,00\n\
2024-01-01;999999;411;EVENTOS INDENIZ\xc1VEIS;0;50,00\n\
2024-01-01;316458;311;CONTRAPRESTA\xc7\xd5ES EFETIVAS;0;9.999,00\n";

const Q2_STATEMENT: &[u8] = b"DATA;REG_ANS;CD_CONTA_CONTABIL;DESCRICAO;VL_SALDO_INICIAL;VL_SALDO_FINAL\n\
2024-04-01;316458;411;EVENTOS CONHECIDOS OU AVISADOS;0;3.000,00\n";

const REGISTRY: &[u8] = b"Registro_Operadora;CNPJ;Razao_Social;Nome_Fantasia;UF\n\
316458;11222333000181;SAUDE ALFA S.A.;ALFA;SP\n\
419761;11222333000182;BETA RUIM LTDA;BETA;RJ\n";

fn zip_with(name: &str, content: &[u8]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file::<_, ()>(name, FileOptions::default()).unwrap();
    zip.write_all(content).unwrap();
    zip.start_file::<_, ()>("leia-me.pdf", FileOptions::default()).unwrap();
    zip.write_all(b"%PDF").unwrap();
    zip.finish().unwrap().into_inner()
}

fn listing(links: &[&str]) -> String {
    let anchors: Vec<String> = links
        .iter()
        .map(|l| format!("<a href=\"{}\">{}</a>", l, l))
        .collect();
    format!("<html><body><pre>{}</pre></body></html>", anchors.join("\n"))
}

struct AnsPortal<'a> {
    root: Mock<'a>,
    year_2023: Mock<'a>,
    q1: Mock<'a>,
    q2: Mock<'a>,
    registry_file: Mock<'a>,
}

fn mock_portal(server: &MockServer) -> AnsPortal<'_> {
    let root = server.mock(|when, then| {
        when.method(GET).path("/demonstracoes_contabeis/");
        then.status(200).body(listing(&["../", "2023/", "2024/"]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/demonstracoes_contabeis/2024/");
        then.status(200).body(listing(&["../", "1T2024.zip", "2T2024.zip"]));
    });
    let year_2023 = server.mock(|when, then| {
        when.method(GET).path("/demonstracoes_contabeis/2023/");
        then.status(200).body(listing(&["4T2023.zip"]));
    });
    let q1 = server.mock(|when, then| {
        when.method(GET).path("/demonstracoes_contabeis/2024/1T2024.zip");
        then.status(200).body(zip_with("1T2024.csv", Q1_STATEMENT));
    });
    let q2 = server.mock(|when, then| {
        when.method(GET).path("/demonstracoes_contabeis/2024/2T2024.zip");
        then.status(200).body(zip_with("2T2024.csv", Q2_STATEMENT));
    });
    server.mock(|when, then| {
        when.method(GET).path("/operadoras/");
        then.status(200).body(listing(&["../", "Relatorio_cadop.csv"]));
    });
    let registry_file = server.mock(|when, then| {
        when.method(GET).path("/operadoras/Relatorio_cadop.csv");
        then.status(200).body(REGISTRY);
    });

    AnsPortal {
        root,
        year_2023,
        q1,
        q2,
        registry_file,
    }
}

fn config_for(server: &MockServer, data_dir: &str) -> TomlConfig {
    let mut config = TomlConfig::default();
    config.source.statements_url = server.url("/demonstracoes_contabeis/");
    config.source.registry_url = server.url("/operadoras/");
    config.source.max_downloads = 2;
    config.storage.data_dir = data_dir.to_string();
    config
}

fn read(dir: &TempDir, path: &str) -> String {
    std::fs::read_to_string(dir.path().join(path)).unwrap()
}

#[tokio::test]
async fn test_full_pipeline_builds_database() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().to_str().unwrap().to_string();
    let server = MockServer::start();
    let portal = mock_portal(&server);

    let storage = LocalStorage::new(&data_dir);
    let pipeline = ExpensePipeline::new(storage.clone(), config_for(&server, &data_dir));
    let engine = EtlEngine::new_with_monitoring(pipeline, false);

    let output = engine.run().await.unwrap();
    assert_eq!(output, files::DATABASE_FILE);

    portal.root.assert();
    portal.q1.assert();
    portal.q2.assert();
    portal.registry_file.assert();
    // two archives were enough, the older year is never listed
    portal.year_2023.assert_hits(0);

    assert!(temp_dir.path().join("raw/2024_1T2024.zip").exists());
    assert!(temp_dir.path().join("raw/2024_2T2024.zip").exists());

    let consolidated = read(&temp_dir, files::CONSOLIDATED_FILE);
    assert_eq!(consolidated.lines().count(), 5);
    assert!(consolidated.contains("316458;2024;1;EVENTOS CONHECIDOS OU AVISADOS;1000,00"));
    assert!(consolidated.contains("EVENTOS INDENIZÁVEIS"));
    assert!(!consolidated.contains("CONTRAPRESTA"));

    let enriched = read(&temp_dir, files::ENRICHED_FILE);
    assert_eq!(enriched.lines().count(), 3);
    assert!(enriched.contains("SAUDE ALFA S.A.;SP"));

    let inconsistencies = read(&temp_dir, files::INCONSISTENCIES_FILE);
    assert_eq!(inconsistencies.lines().count(), 3);
    assert!(inconsistencies.contains("BETA RUIM LTDA;RJ;False"));
    assert!(inconsistencies.contains("999999;2024;1;EVENTOS INDENIZÁVEIS;50,00;;;;False"));

    let aggregated = read(&temp_dir, files::AGGREGATED_FILE);
    assert_eq!(
        aggregated.lines().collect::<Vec<_>>(),
        vec![
            "RazaoSocial;UF;TotalDespesas;MediaTrimestral;DesvioPadrao",
            "SAUDE ALFA S.A.;SP;4000,00;2000,00;1414,21",
        ]
    );

    let db = ExpenseDatabase::load(&storage, files::DATABASE_FILE).await.unwrap();
    assert_eq!(db.operadoras.len(), 1);
    assert_eq!(db.despesas_detalhadas.len(), 2);
    assert_eq!(db.despesas_agregadas.len(), 1);
    assert_eq!(db.summary().total_gasto_geral, Some(4000.0));
    assert_eq!(db.top_operators(10)[0].razao_social, "SAUDE ALFA S.A.");
}

#[tokio::test]
async fn test_second_run_uses_cached_downloads_and_refreshes_database() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().to_str().unwrap().to_string();
    let server = MockServer::start();
    let portal = mock_portal(&server);

    for _ in 0..2 {
        let pipeline =
            ExpensePipeline::new(LocalStorage::new(&data_dir), config_for(&server, &data_dir));
        EtlEngine::new(pipeline).run().await.unwrap();
    }

    portal.q1.assert_hits(1);
    portal.q2.assert_hits(1);
    portal.registry_file.assert_hits(1);

    let storage = LocalStorage::new(&data_dir);
    let db = ExpenseDatabase::load(&storage, files::DATABASE_FILE).await.unwrap();
    assert_eq!(db.despesas_detalhadas.len(), 2);

    let summary = importer::load_data(&storage, false).await.unwrap();
    assert_eq!(summary.operators, 0);
    assert_eq!(summary.detailed_expenses, 2);

    let db = ExpenseDatabase::load(&storage, files::DATABASE_FILE).await.unwrap();
    assert_eq!(db.operadoras.len(), 1);
    assert_eq!(db.despesas_detalhadas.len(), 4);
    assert_eq!(db.despesas_agregadas.len(), 2);
}

#[tokio::test]
async fn test_unreachable_portal_fails_with_network_error() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().to_str().unwrap().to_string();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/demonstracoes_contabeis/");
        then.status(503);
    });

    let pipeline =
        ExpensePipeline::new(LocalStorage::new(&data_dir), config_for(&server, &data_dir));
    let err = EtlEngine::new(pipeline).run().await.unwrap_err();

    assert_eq!(
        err.category(),
        ans_expenses::utils::error::ErrorCategory::Network
    );
    assert!(!temp_dir.path().join(files::DATABASE_FILE).exists());
}
