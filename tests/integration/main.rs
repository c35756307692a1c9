//! Integration tests: the full pipeline over scripted collaborators.

mod mock_collaborators;
mod simulation;
