//! Portal REST resources on top of the gateway.

pub mod client;
pub mod types;

pub use client::{
    AccountApi, NeighborhoodsApi, NoticesApi, PortalClient, ReportsApi, SchedulesApi,
};
pub use types::*;
