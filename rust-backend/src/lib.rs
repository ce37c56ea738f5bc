pub mod config {
    pub mod settings;
}
pub mod middleware {
    pub mod metrics;
    pub mod path_logger;
}
pub mod routes {
    pub mod health;
    pub mod scanner;
}
pub mod services {
    pub mod models;
    pub mod source;

    pub mod indicators;
    pub mod scoring;
    pub mod pipeline;
    pub mod cache;
    pub mod scanner;

    pub mod binance {
        pub mod api;
        pub mod client;
    }
}
pub mod utils {
    pub mod errors;
    pub mod types;
}
