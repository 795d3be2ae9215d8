pub mod reports_api;
