use anoncreds_bls::Attributes;

#[derive(Attributes)]
struct Tagged<T: std::fmt::Display> {
    tag: T,
    level: u8,
}

fn main() {
    let values = Tagged { tag: "gold", level: 3 }.credential_values();
    assert_eq!(values.get("tag").unwrap().raw, "gold");
    assert_eq!(Tagged::<&str>::attribute_names().len(), 2);
}
