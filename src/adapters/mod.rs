pub mod git;

pub use git::GitMetadataAdapter;
