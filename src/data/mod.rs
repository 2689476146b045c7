pub mod batch;
pub mod charset;
pub mod dataset;
pub mod loader;

pub use batch::Batch;
pub use charset::Charset;
pub use dataset::{CaptchaDataset, CaptchaSample};
pub use loader::DataLoader;
