pub mod datatype;
pub mod value;
