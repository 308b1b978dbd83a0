pub mod cleanup;
pub mod corpus;
pub mod handlers;
pub mod job;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod scorer;
pub mod upload_cache;

#[cfg(test)]
pub mod testing;
