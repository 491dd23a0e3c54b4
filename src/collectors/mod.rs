pub mod capacity;
pub mod diskspace;
pub mod host;
pub mod mounts;

#[cfg(test)]
pub mod mock;
