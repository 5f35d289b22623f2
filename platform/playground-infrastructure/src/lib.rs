pub mod api;
pub mod identity;

#[cfg(test)]
pub(crate) mod test_server;
