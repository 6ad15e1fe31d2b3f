use anoncreds_bls::Attributes;

#[derive(Attributes)]
struct Person {
    name: String,
    age: u32,
}

fn main() {
    let names = Person::attribute_names();
    assert!(names.contains("name"));
    assert!(names.contains("age"));

    let values = Person {
        name: "Alex".to_string(),
        age: 28,
    }
    .credential_values();
    assert_eq!(values.get("age").unwrap().encoded, "28");
}
