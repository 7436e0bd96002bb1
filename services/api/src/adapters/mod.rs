pub mod db;

pub use db::DbAdapter;
