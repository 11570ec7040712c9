use std::io::Write;

use motor_link::{DeviceRegistry, DeviceVariant, LinkError, VariantCatalog};

fn catalog_toml(ck3862s_default: u8) -> String {
    let mut s = String::from("[[variant]]\nmodel = \"CK3864S\"\nparameters = [\n");
    for i in 0..13 {
        s.push_str(&format!("  {{ name = \"P{i}\", min = 1, max = 50, default = {} }},\n", i + 1));
    }
    s.push_str("]\n\n[[variant]]\nmodel = \"CK3862S\"\nparameters = [\n");
    for i in 0..8 {
        s.push_str(&format!(
            "  {{ name = \"Q{i}\", min = 1, max = 9, default = {ck3862s_default} }},\n"
        ));
    }
    s.push_str("]\n");
    s
}

#[test]
fn registry_loads_catalog_from_disk() {
    let mut f = tempfile::NamedTempFile::new().expect("tempfile");
    f.write_all(catalog_toml(3).as_bytes()).expect("write");

    let reg = DeviceRegistry::with_catalog_path(f.path(), DeviceVariant::Ck3862s).expect("load");
    assert_eq!(reg.values(), vec![3; 8]);
    assert_eq!(reg.parameters()[0].name, "Q0");

    let reg = DeviceRegistry::with_catalog_path(f.path(), DeviceVariant::Ck3864s).expect("load");
    assert_eq!(reg.values(), (1..=13).collect::<Vec<u8>>());
}

#[test]
fn catalog_default_out_of_range_is_rejected() {
    let mut f = tempfile::NamedTempFile::new().expect("tempfile");
    f.write_all(catalog_toml(10).as_bytes()).expect("write");
    let err = DeviceRegistry::with_catalog_path(f.path(), DeviceVariant::Ck3862s)
        .expect_err("default 10 exceeds max 9");
    assert!(matches!(err, LinkError::Protocol(_)), "{err}");
}

#[test]
fn missing_catalog_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");
    assert!(VariantCatalog::from_path(&path).is_err());
}

#[test]
fn builtin_catalog_is_shared() {
    let a = VariantCatalog::builtin();
    let b = VariantCatalog::builtin();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(a.defaults(DeviceVariant::Ck3864s).map(<[_]>::len), Some(13));
}
