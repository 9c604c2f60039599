pub mod errors;
pub mod filters;
pub mod intent;
pub mod mapping;
pub mod model;
pub mod sanitize;
pub mod value;

pub use errors::*;
pub use filters::{EntityRecognizer, FilterExtractor, NoEntities};
pub use intent::IntentKind;
pub use mapping::{IntentMappingTable, LabelSpace, MappingRow};
pub use model::*;
pub use sanitize::sanitize;
pub use value::{Document, Map, Value, ID_FIELD};
