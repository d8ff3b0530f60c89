//! Portal scraping: the browser seam, the rate-limited driver, and the
//! Yahoo News stream extractor.
//!
//! The scrape is a single sequential pass: navigate to the stream page,
//! scroll until the content stops growing, read the container's inner HTML,
//! and parse it into headline records. Every navigation and scroll step is
//! paced by the driver's throttle; the browser session is acquired by the
//! caller and must be closed on every exit path.

pub mod browser;
pub mod driver;
pub mod yahoo;
