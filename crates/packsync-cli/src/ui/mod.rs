mod tracker;

pub use tracker::BarSink;
