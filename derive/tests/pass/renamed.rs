use anoncreds_bls::Attributes;

#[derive(Attributes)]
struct License {
    #[anoncreds(name = "Licence Class")]
    class: char,
    #[anoncreds(name = "expiry")]
    expires_at: i64,
}

fn main() {
    let names = License::attribute_names();
    assert!(names.contains("licenceclass"));
    assert!(names.contains("expiry"));
    assert!(!names.contains("expires_at"));

    let values = License {
        class: 'B',
        expires_at: 20301231,
    }
    .credential_values();
    assert_eq!(values.get("licenceclass").unwrap().raw, "B");
    assert_eq!(values.get("expiry").unwrap().encoded, "20301231");
}
