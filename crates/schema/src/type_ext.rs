use parser::types::Type;

pub trait TypeExt {
    fn is_non_null(&self) -> bool;
}

impl TypeExt for Type {
    #[inline]
    fn is_non_null(&self) -> bool {
        !self.nullable
    }
}
