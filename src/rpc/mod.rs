/// Host callback contract and the persistence adapter.
pub mod persistence;
