use serde::{Deserialize, Serialize};

pub mod corpus_record;
pub mod question;

pub trait StoredObject: Serialize + for<'de> Deserialize<'de> {
    fn table_name() -> &'static str;
    fn get_id(&self) -> &str;
}
