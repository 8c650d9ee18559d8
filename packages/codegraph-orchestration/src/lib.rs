//! Downstream/upstream graph queries, repository parsing orchestration, and
//! the fixed-size parsing-job worker pool (C5-C7, §4.5-§4.7).

pub mod graph_service;
pub mod parsing_service;
pub mod worker;

pub use graph_service::GraphService;
pub use parsing_service::ParsingService;
pub use worker::WorkerManager;

#[cfg(test)]
mod tests {
    #[test]
    fn it_works() {
        assert_eq!(2 + 2, 4);
    }
}
