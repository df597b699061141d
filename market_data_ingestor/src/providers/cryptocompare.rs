//! CryptoCompare REST provider (`min-api.cryptocompare.com`, `/data/v2/histo*`).

pub mod params;
pub mod provider;
pub mod response;

pub use params::CryptoCompareParams;
pub use provider::CryptoCompareProvider;
