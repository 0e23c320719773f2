pub mod firestore;

pub use firestore::{FirestoreConfig, FirestorePointerStore};
