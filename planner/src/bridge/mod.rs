pub mod model;
pub mod server;

pub use model::ReportModel;
pub use server::ReportBridge;
