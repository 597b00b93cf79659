//! Reelbox Core - Media browsing and music playback engine
//!
//! This crate provides the core functionality of reelbox: the local
//! watchlist/favorites library, the playback queue and player, audio output
//! through the system device, and the movie and music API clients.

pub mod catalog;
pub mod command;
pub mod decoder;
pub mod device;
pub mod library;
pub mod music;
pub mod output;
pub mod player;
pub mod queue;
pub mod resolver;
pub mod session;
pub mod storage;
pub mod track;

pub use catalog::{ CatalogClient, CatalogPage, ContentFilter, ContentRecord, DiscoverQuery, Genre, SortBy };
pub use command::{ Command, CommandError };
pub use device::DeviceOutput;
pub use library::{ LibraryItem, LibrarySet, LibraryStore, MediaType };
pub use music::MusicClient;
pub use output::{ AudioOutput, LoadToken, NullOutput, OutputEvent, OutputEventKind, OutputListener };
pub use player::{ LoadRequest, PlaybackState, Player, PlayerStatus };
pub use queue::Queue;
pub use resolver::{ HttpResolver, ResolveError, StreamResolver };
pub use session::{ Session, SessionEvent };
pub use storage::{ FileStorage, MemoryStorage, Storage, StorageError };
pub use track::Track;
