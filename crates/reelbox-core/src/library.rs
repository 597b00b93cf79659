//! Local library of saved titles
//!
//! Holds the watchlist and favorites sets, keyed by content id, and mirrors
//! every mutation into durable storage. Storage problems never reach the
//! caller: unreadable sets hydrate as empty and failed writes are logged.

use std::collections::HashSet;
use std::fmt;

use serde::{ Deserialize, Deserializer, Serialize };

use crate::storage::Storage;


/// Kind of content a library item refers to.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize )]
#[serde( rename_all = "lowercase" )]
pub enum MediaType {
    #[default]
    Movie,
    Tv,
}


impl MediaType {
    /// Path segment used by the metadata API.
    pub fn as_str( &self ) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}


impl fmt::Display for MediaType {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.write_str( self.as_str() )
    }
}


/// A saved reference to a movie or show.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
pub struct LibraryItem {
    pub id: i64,

    #[serde( default, alias = "name", deserialize_with = "null_as_default" )]
    pub title: String,

    #[serde( default )]
    pub poster_path: Option<String>,

    #[serde( default, deserialize_with = "null_as_default" )]
    pub media_type: MediaType,

    #[serde( default, deserialize_with = "null_as_default" )]
    pub vote_average: f64,

    /// ISO date, possibly partial ("2019" or "2019-05").
    #[serde( default, alias = "first_air_date", deserialize_with = "null_as_default" )]
    pub release_date: String,
}


impl LibraryItem {
    /// Year component of the release date, if it has one.
    pub fn year( &self ) -> Option<i32> {
        self.release_date.get( ..4 ).and_then( |y| y.parse().ok() )
    }
}


/// Treats an explicit JSON `null` like a missing field.
pub( crate ) fn null_as_default<'de, D, T>( deserializer: D ) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok( Option::<T>::deserialize( deserializer )?.unwrap_or_default() )
}


/// The two independent sets a title can belong to.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub enum LibrarySet {
    Watchlist,
    Favorites,
}


impl LibrarySet {
    /// Both sets, in hydration order.
    pub const ALL: [LibrarySet; 2] = [ LibrarySet::Watchlist, LibrarySet::Favorites ];


    /// Storage key the set is persisted under.
    pub fn storage_key( &self ) -> &'static str {
        match self {
            LibrarySet::Watchlist => "watchlist",
            LibrarySet::Favorites => "favorites",
        }
    }
}


impl fmt::Display for LibrarySet {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.write_str( self.storage_key() )
    }
}


/// Watchlist and favorites, persisted through a [`Storage`] backend.
pub struct LibraryStore<S: Storage> {
    storage: S,
    watchlist: Vec<LibraryItem>,
    favorites: Vec<LibraryItem>,
}


impl<S: Storage> LibraryStore<S> {
    /// Opens the store and hydrates both sets from storage.
    ///
    /// Absent, empty or malformed entries become empty sets.
    pub fn open( storage: S ) -> Self {
        let mut store = Self {
            storage,
            watchlist: Vec::new(),
            favorites: Vec::new(),
        };

        for set in LibrarySet::ALL {
            let items = store.hydrate( set );
            tracing::info!( "Loaded {} item(s) into {}", items.len(), set );
            *store.items_mut( set ) = items;
        }

        store
    }


    fn hydrate( &self, set: LibrarySet ) -> Vec<LibraryItem> {
        let raw = match self.storage.read( set.storage_key() ) {
            Ok( Some( raw ) ) => raw,
            Ok( None ) => return Vec::new(),
            Err( e ) => {
                tracing::warn!( "Failed to read {}: {}", set, e );
                return Vec::new();
            }
        };

        if raw.trim().is_empty() {
            return Vec::new();
        }

        let items: Vec<LibraryItem> = match serde_json::from_str( &raw ) {
            Ok( items ) => items,
            Err( e ) => {
                tracing::warn!( "Discarding unreadable {}: {}", set, e );
                return Vec::new();
            }
        };

        // Keep the first occurrence of each id
        let mut seen = HashSet::new();
        items.into_iter().filter( |item| seen.insert( item.id ) ).collect()
    }


    /// Adds the item if its id is absent from the set, removes it otherwise.
    ///
    /// @returns true if the item is in the set afterwards
    pub fn toggle( &mut self, set: LibrarySet, item: LibraryItem ) -> bool {
        if self.contains( set, item.id ) {
            self.remove( set, item.id );
            false
        } else {
            self.add( set, item );
            true
        }
    }


    /// Appends the item unless its id is already present.
    ///
    /// @returns true if the set changed
    pub fn add( &mut self, set: LibrarySet, item: LibraryItem ) -> bool {
        if self.contains( set, item.id ) {
            return false;
        }

        tracing::debug!( "Adding {} ({}) to {}", item.id, item.title, set );
        self.items_mut( set ).push( item );
        self.persist( set );
        true
    }


    /// Removes the item with the given id.
    ///
    /// @returns true if the set changed
    pub fn remove( &mut self, set: LibrarySet, id: i64 ) -> bool {
        let items = self.items_mut( set );
        let before = items.len();
        items.retain( |item| item.id != id );

        if items.len() == before {
            return false;
        }

        tracing::debug!( "Removed {} from {}", id, set );
        self.persist( set );
        true
    }


    /// Returns true if an item with this id is in the set.
    pub fn contains( &self, set: LibrarySet, id: i64 ) -> bool {
        self.items( set ).iter().any( |item| item.id == id )
    }


    /// Gets all items of a set, in insertion order.
    pub fn items( &self, set: LibrarySet ) -> &[LibraryItem] {
        match set {
            LibrarySet::Watchlist => &self.watchlist,
            LibrarySet::Favorites => &self.favorites,
        }
    }


    /// Gets the number of items in a set.
    pub fn len( &self, set: LibrarySet ) -> usize {
        self.items( set ).len()
    }


    /// Gets the storage backend.
    pub fn storage( &self ) -> &S {
        &self.storage
    }


    fn items_mut( &mut self, set: LibrarySet ) -> &mut Vec<LibraryItem> {
        match set {
            LibrarySet::Watchlist => &mut self.watchlist,
            LibrarySet::Favorites => &mut self.favorites,
        }
    }


    /// Writes a set through to storage. Failures leave memory authoritative.
    fn persist( &self, set: LibrarySet ) {
        let json = match serde_json::to_string( self.items( set ) ) {
            Ok( json ) => json,
            Err( e ) => {
                tracing::warn!( "Failed to serialize {}: {}", set, e );
                return;
            }
        };

        if let Err( e ) = self.storage.write( set.storage_key(), &json ) {
            tracing::warn!( "Failed to save {}: {}", set, e );
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::storage::{ FileStorage, MemoryStorage, StorageError };


    fn item( id: i64 ) -> LibraryItem {
        LibraryItem {
            id,
            title: format!( "Title {}", id ),
            poster_path: Some( format!( "/poster{}.jpg", id ) ),
            media_type: MediaType::Movie,
            vote_average: 7.5,
            release_date: "2021-03-04".into(),
        }
    }


    fn ids( store: &LibraryStore<MemoryStorage>, set: LibrarySet ) -> Vec<i64> {
        store.items( set ).iter().map( |i| i.id ).collect()
    }


    /// Storage whose every call fails.
    struct BrokenStorage;


    impl Storage for BrokenStorage {
        fn read( &self, _key: &str ) -> Result<Option<String>, StorageError> {
            Err( StorageError::Unavailable( "disk on fire".into() ) )
        }


        fn write( &self, _key: &str, _value: &str ) -> Result<(), StorageError> {
            Err( StorageError::Unavailable( "disk on fire".into() ) )
        }
    }


    #[test]
    fn test_toggle_adds_then_removes() {
        let mut store = LibraryStore::open( MemoryStorage::new() );

        assert!( store.toggle( LibrarySet::Watchlist, item( 42 ) ) );
        assert!( store.contains( LibrarySet::Watchlist, 42 ) );

        assert!( !store.toggle( LibrarySet::Watchlist, item( 42 ) ) );
        assert!( !store.contains( LibrarySet::Watchlist, 42 ) );
    }


    #[test]
    fn test_membership_follows_toggle_parity() {
        let mut store = LibraryStore::open( MemoryStorage::new() );

        for n in 1..=7 {
            store.toggle( LibrarySet::Favorites, item( 5 ) );
            assert_eq!( store.contains( LibrarySet::Favorites, 5 ), n % 2 == 1 );
        }
    }


    #[test]
    fn test_sets_are_independent() {
        let mut store = LibraryStore::open( MemoryStorage::new() );

        store.toggle( LibrarySet::Watchlist, item( 1 ) );
        store.toggle( LibrarySet::Favorites, item( 1 ) );
        store.toggle( LibrarySet::Watchlist, item( 1 ) );

        assert!( !store.contains( LibrarySet::Watchlist, 1 ) );
        assert!( store.contains( LibrarySet::Favorites, 1 ) );
    }


    #[test]
    fn test_items_keep_first_insertion_order_without_duplicates() {
        let mut store = LibraryStore::open( MemoryStorage::new() );

        for id in [ 3, 1, 2 ] {
            store.toggle( LibrarySet::Watchlist, item( id ) );
        }
        store.add( LibrarySet::Watchlist, item( 1 ) );
        store.toggle( LibrarySet::Watchlist, item( 1 ) );
        store.toggle( LibrarySet::Watchlist, item( 4 ) );

        assert_eq!( ids( &store, LibrarySet::Watchlist ), vec![ 3, 2, 4 ] );
    }


    #[test]
    fn test_add_and_remove_report_changes() {
        let mut store = LibraryStore::open( MemoryStorage::new() );

        assert!( store.add( LibrarySet::Favorites, item( 9 ) ) );
        assert!( !store.add( LibrarySet::Favorites, item( 9 ) ) );
        assert_eq!( store.len( LibrarySet::Favorites ), 1 );

        assert!( store.remove( LibrarySet::Favorites, 9 ) );
        assert!( !store.remove( LibrarySet::Favorites, 9 ) );
    }


    #[test]
    fn test_every_mutation_is_persisted() {
        let mut store = LibraryStore::open( MemoryStorage::new() );

        store.toggle( LibrarySet::Watchlist, item( 7 ) );
        let saved = store.storage().get( "watchlist" ).unwrap();
        let parsed: Vec<LibraryItem> = serde_json::from_str( &saved ).unwrap();
        assert_eq!( parsed, vec![ item( 7 ) ] );

        store.toggle( LibrarySet::Watchlist, item( 7 ) );
        assert_eq!( store.storage().get( "watchlist" ).as_deref(), Some( "[]" ) );
        assert!( store.storage().get( "favorites" ).is_none() );
    }


    #[test]
    fn test_invalid_favorites_json_hydrates_empty() {
        let storage = MemoryStorage::new()
            .with_entry( "favorites", "{not json" )
            .with_entry( "watchlist", r#"[{"id":1,"title":"Heat","media_type":"movie","vote_average":8.3,"release_date":"1995-12-15","poster_path":null}]"# );

        let store = LibraryStore::open( storage );

        assert!( store.items( LibrarySet::Favorites ).is_empty() );
        assert_eq!( ids( &store, LibrarySet::Watchlist ), vec![ 1 ] );
    }


    #[test]
    fn test_empty_and_null_entries_hydrate_empty() {
        let storage = MemoryStorage::new()
            .with_entry( "favorites", "" )
            .with_entry( "watchlist", "null" );

        let store = LibraryStore::open( storage );

        assert_eq!( store.len( LibrarySet::Favorites ), 0 );
        assert_eq!( store.len( LibrarySet::Watchlist ), 0 );
    }


    #[test]
    fn test_hydrate_drops_duplicate_ids() {
        let storage = MemoryStorage::new().with_entry(
            "watchlist",
            r#"[{"id":1,"title":"A"},{"id":2,"title":"B"},{"id":1,"title":"A again"}]"#,
        );

        let store = LibraryStore::open( storage );

        assert_eq!( ids( &store, LibrarySet::Watchlist ), vec![ 1, 2 ] );
        assert_eq!( store.items( LibrarySet::Watchlist )[ 0 ].title, "A" );
    }


    #[test]
    fn test_hydrate_accepts_tv_field_names() {
        let storage = MemoryStorage::new().with_entry(
            "favorites",
            r#"[{"id":1399,"name":"Game of Thrones","first_air_date":"2011-04-17","media_type":"tv","vote_average":null}]"#,
        );

        let store = LibraryStore::open( storage );
        let show = &store.items( LibrarySet::Favorites )[ 0 ];

        assert_eq!( show.title, "Game of Thrones" );
        assert_eq!( show.media_type, MediaType::Tv );
        assert_eq!( show.release_date, "2011-04-17" );
        assert_eq!( show.vote_average, 0.0 );
        assert_eq!( show.year(), Some( 2011 ) );
    }


    #[test]
    fn test_broken_storage_never_fails_caller() {
        let mut store = LibraryStore::open( BrokenStorage );

        assert!( store.toggle( LibrarySet::Watchlist, item( 1 ) ) );
        assert!( store.contains( LibrarySet::Watchlist, 1 ) );
        assert_eq!( store.len( LibrarySet::Favorites ), 0 );
    }


    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let mut store = LibraryStore::open( FileStorage::new( dir.path() ) );
            store.toggle( LibrarySet::Favorites, item( 11 ) );
            store.toggle( LibrarySet::Favorites, item( 12 ) );
        }

        let store = LibraryStore::open( FileStorage::new( dir.path() ) );
        let ids: Vec<i64> = store.items( LibrarySet::Favorites ).iter().map( |i| i.id ).collect();
        assert_eq!( ids, vec![ 11, 12 ] );
    }
}
