mod reference;
mod template;

pub use reference::{parse_reference, Reference, ReferenceError};
pub use template::{parse_template, references_in_value, Segment, Template, TemplateError};
