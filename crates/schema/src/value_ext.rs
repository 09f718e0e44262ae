use value::Value;

pub trait ValueExt {
    /// Names of every variable referenced by this value, in document order.
    fn referenced_variables(&self) -> Vec<&str>;
}

impl ValueExt for Value {
    fn referenced_variables(&self) -> Vec<&str> {
        fn collect<'a>(value: &'a Value, names: &mut Vec<&'a str>) {
            match value {
                Value::Variable(name) => {
                    if !names.contains(&name.as_str()) {
                        names.push(name.as_str());
                    }
                },
                Value::List(values) => values.iter().for_each(|value| collect(value, names)),
                Value::Object(fields) => fields.values().for_each(|value| collect(value, names)),
                _ => {},
            }
        }

        let mut names = Vec::new();
        collect(self, &mut names);
        names
    }
}
