mod fixture;
mod sqlite_remote;

pub use fixture::{RemoteFixture, load_fixture, load_fixtures_from_str};
pub use sqlite_remote::SqliteRemote;
