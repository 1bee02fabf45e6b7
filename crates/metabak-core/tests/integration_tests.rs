//! Integration tests for metabak-core.
//!
//! These tests verify end-to-end workflows with real filesystem operations:
//! key files on disk, encrypted and compressed sources, materialized plain
//! backups and container inspection.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use flate2::Compression as GzLevel;
use flate2::write::GzEncoder;
use metabak_core::BackupError;
use metabak_core::BackupWriter;
use metabak_core::DataEncryptor;
use metabak_core::DecodeSpec;
use metabak_core::EncryptAlgo;
use metabak_core::LoadOptions;
use metabak_core::MaterializeOutcome;
use metabak_core::MetaLoader;
use metabak_core::ScanLoader;
use metabak_core::SegmentKind;
use metabak_core::materialize;
use metabak_core::read_footer;
use metabak_core::read_segment;
use metabak_core::report::render_segment;
use metabak_core::report::render_summary;
use metabak_core::stream;
use pkcs8::EncodePrivateKey;
use pkcs8::LineEnding;
use pkcs8::PrivateKeyInfo;
use pkcs8::pkcs5::pbes2;
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use serde_json::json;
use std::fs;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::OnceLock;
use tempfile::TempDir;

fn private_key() -> RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap())
        .clone()
}

fn write_pkcs1_key(dir: &Path) -> PathBuf {
    let path = dir.join("key.pem");
    let pem = private_key().to_pkcs1_pem(LineEnding::LF).unwrap();
    fs::write(&path, pem.as_bytes()).unwrap();
    path
}

/// Encrypted PKCS#8 with cheap PBKDF2 parameters.
fn encrypted_pkcs8_pem(passphrase: &str) -> String {
    let der = private_key().to_pkcs8_der().unwrap();
    let info = PrivateKeyInfo::try_from(der.as_bytes()).unwrap();
    let params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(1_000, b"metabak-salt", &[7u8; 16])
        .unwrap();
    info.encrypt_with_params(params, "hunter2")
        .unwrap()
        .to_pem("ENCRYPTED PRIVATE KEY", LineEnding::LF)
        .unwrap()
        .to_string()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn sample_container() -> Vec<u8> {
    let mut writer = BackupWriter::new(Vec::new());
    writer
        .write_segment(
            SegmentKind::Format,
            &[json!({"Name": "myjfs", "UUID": "8a1f", "SecretKey": "removed"})],
        )
        .unwrap();
    writer
        .write_segment(SegmentKind::Counter, &[json!({"nextInode": 4})])
        .unwrap();
    writer
        .write_segment(
            SegmentKind::Edge,
            &[
                json!({"parent": 1, "name": "a", "inode": 2}),
                json!({"parent": 1, "name": "b", "inode": 3}),
            ],
        )
        .unwrap();
    writer.finish().unwrap()
}

const JSON_DUMP: &[u8] = br#"{"Setting":{"Name":"myjfs","SecretKey":"abc"},"Counters":{"nextInode":2}}"#;

#[test]
fn test_gzip_json_materializes_next_to_source() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("backup.json.gz");
    fs::write(&source, gzip(JSON_DUMP)).unwrap();

    let plain = materialize(&DecodeSpec::new(&source)).unwrap();
    assert_eq!(plain.path, temp.path().join("backup.json"));
    assert_eq!(fs::read(&plain.path).unwrap(), JSON_DUMP);

    let again = materialize(&DecodeSpec::new(&source)).unwrap();
    assert_eq!(again.outcome, MaterializeOutcome::CacheHit);
}

#[test]
fn test_encrypted_gzip_container_with_key_file() {
    let temp = TempDir::new().unwrap();
    let key_path = write_pkcs1_key(temp.path());
    let encryptor = DataEncryptor::new(private_key(), EncryptAlgo::Chacha20Rsa);

    let source = temp.path().join("dump.bin.gz");
    fs::write(&source, encryptor.encrypt(&gzip(&sample_container())).unwrap()).unwrap();

    let spec = DecodeSpec::new(&source)
        .with_private_key(key_path.to_str().unwrap())
        .with_algorithm(EncryptAlgo::Chacha20Rsa);
    let plain = materialize(&spec).unwrap();
    assert_eq!(plain.path, temp.path().join("dump.bin"));
    assert_eq!(fs::read(&plain.path).unwrap(), sample_container());

    let mut file = File::open(&plain.path).unwrap();
    let footer = read_footer(&mut file).unwrap();
    assert_eq!(footer.total_count(), 4);
}

#[test]
fn test_encrypted_pkcs8_key_with_passphrase() {
    let temp = TempDir::new().unwrap();
    let encryptor = DataEncryptor::new(private_key(), EncryptAlgo::Aes256GcmRsa);
    let source = temp.path().join("dump.json");
    fs::write(&source, encryptor.encrypt(JSON_DUMP).unwrap()).unwrap();

    let pem = encrypted_pkcs8_pem("hunter2");
    let spec = DecodeSpec::new(&source)
        .with_private_key(pem.clone())
        .with_passphrase("hunter2");
    let mut composed = stream::open(&spec).unwrap();
    let mut plain = Vec::new();
    composed.read_to_end(&mut plain).unwrap();
    assert_eq!(plain, JSON_DUMP);
    assert_eq!(composed.close().unwrap(), 1);

    let err = stream::open(&DecodeSpec::new(&source).with_private_key(pem)).unwrap_err();
    assert!(matches!(err, BackupError::PassphraseRequired { .. }));
}

#[test]
fn test_wrong_passphrase_is_key_error() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("dump.json");
    fs::write(&source, b"irrelevant").unwrap();

    let spec = DecodeSpec::new(&source)
        .with_private_key(encrypted_pkcs8_pem("hunter2"))
        .with_passphrase("wrong");
    let err = materialize(&spec).unwrap_err();
    assert!(matches!(err, BackupError::KeyResolution { .. }));
    assert!(err.is_configuration_error());
}

#[test]
fn test_wrong_key_fails_decrypt() {
    let temp = TempDir::new().unwrap();
    let other = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    let source = temp.path().join("dump.bin.gz");
    let envelope = DataEncryptor::new(other, EncryptAlgo::Aes256GcmRsa)
        .encrypt(&gzip(&sample_container()))
        .unwrap();
    fs::write(&source, envelope).unwrap();

    let spec = DecodeSpec::new(&source).with_private_key(write_pkcs1_key(temp.path()).to_str().unwrap());
    let err = materialize(&spec).unwrap_err();
    assert!(matches!(err, BackupError::Decrypt { .. }));
    assert!(!temp.path().join("dump.bin").exists());
}

#[test]
fn test_inspect_materialized_container() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("dump.bin");
    fs::write(&path, sample_container()).unwrap();

    let mut file = File::open(&path).unwrap();
    let footer = read_footer(&mut file).unwrap();

    let summary = render_summary(&footer, true);
    let names: Vec<&str> = summary
        .lines()
        .skip(4)
        .filter_map(|line| line.split('|').next())
        .map(str::trim)
        .collect();
    assert_eq!(names, ["counter", "edge", "format"]);

    let edge = footer.get("edge").unwrap();
    let segment = read_segment(&mut file, edge.offset).unwrap();
    let text = render_segment(&segment);
    assert!(text.starts_with("Segment: edge\nValue: [{"));
    assert!(text.contains("\"inode\":3"));
}

#[test]
fn test_scan_loader_over_materialized_backup() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("dump.bin.gz");
    fs::write(&source, gzip(&sample_container())).unwrap();

    let plain = materialize(&DecodeSpec::new(&source)).unwrap();
    let summary = ScanLoader::new()
        .load_binary(&plain.path, &LoadOptions::new(2))
        .unwrap();
    assert_eq!(summary.total_records(), 4);
    assert!(summary.secret_key_removed);
    assert_eq!(summary.volume.as_deref(), Some("myjfs"));
}

#[test]
fn test_scan_loader_over_composed_json() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("dump.json.gz");
    fs::write(&source, gzip(JSON_DUMP)).unwrap();

    let mut composed = stream::open(&DecodeSpec::new(&source)).unwrap();
    let summary = ScanLoader::new().load_json(&mut composed).unwrap();
    assert_eq!(composed.close().unwrap(), 2);
    assert!(!summary.secret_key_removed);
    assert_eq!(summary.sections["Counters"], 1);
}
