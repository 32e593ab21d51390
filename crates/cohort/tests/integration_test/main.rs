mod execution;
mod registry;
