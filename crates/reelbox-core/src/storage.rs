//! Durable key/value storage
//!
//! The library store mirrors each of its sets into a string-keyed entry.
//! `FileStorage` keeps one JSON file per key; `MemoryStorage` keeps entries
//! in process for tests and ephemeral sessions.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{ Path, PathBuf };
use std::sync::Mutex;

use thiserror::Error;


/// Errors that can occur when reading or writing stored entries.
#[derive( Debug, Error )]
pub enum StorageError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Storage unavailable: {0}" )]
    Unavailable( String ),
}


/// String-keyed persistence used by the library store.
pub trait Storage {
    /// Reads an entry. A missing entry is `Ok( None )`, not an error.
    fn read( &self, key: &str ) -> Result<Option<String>, StorageError>;

    /// Replaces an entry.
    fn write( &self, key: &str, value: &str ) -> Result<(), StorageError>;
}


/// Stores each entry as `<key>.json` inside a directory.
#[derive( Debug, Clone )]
pub struct FileStorage {
    dir: PathBuf,
}


impl FileStorage {
    /// Creates storage rooted at `dir`. The directory is created on first write.
    pub fn new( dir: impl Into<PathBuf> ) -> Self {
        Self { dir: dir.into() }
    }


    /// Gets the default data directory (`~/.local/share/reelbox` on Linux).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map( |d| d.join( "reelbox" ) )
    }


    /// Gets the directory entries are stored in.
    pub fn dir( &self ) -> &Path {
        &self.dir
    }


    fn entry_path( &self, key: &str ) -> PathBuf {
        self.dir.join( format!( "{}.json", key ) )
    }
}


impl Storage for FileStorage {
    fn read( &self, key: &str ) -> Result<Option<String>, StorageError> {
        match fs::read_to_string( self.entry_path( key ) ) {
            Ok( contents ) => Ok( Some( contents ) ),
            Err( e ) if e.kind() == ErrorKind::NotFound => Ok( None ),
            Err( e ) => Err( StorageError::Io( e ) ),
        }
    }


    fn write( &self, key: &str, value: &str ) -> Result<(), StorageError> {
        if !self.dir.exists() {
            fs::create_dir_all( &self.dir )?;
        }

        // Entry is replaced atomically via a sibling temp file
        let path = self.entry_path( key );
        let tmp = path.with_extension( "json.tmp" );
        fs::write( &tmp, value )?;
        fs::rename( &tmp, &path )?;
        Ok(())
    }
}


/// In-process storage. Nothing survives the process.
#[derive( Debug, Default )]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}


impl MemoryStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }


    /// Creates storage pre-populated with one entry.
    pub fn with_entry( self, key: &str, value: &str ) -> Self {
        self.entries
            .lock()
            .unwrap_or_else( |poisoned| poisoned.into_inner() )
            .insert( key.to_string(), value.to_string() );
        self
    }


    /// Returns a copy of an entry, if present.
    pub fn get( &self, key: &str ) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else( |poisoned| poisoned.into_inner() )
            .get( key )
            .cloned()
    }
}


impl Storage for MemoryStorage {
    fn read( &self, key: &str ) -> Result<Option<String>, StorageError> {
        let entries = self.entries
            .lock()
            .map_err( |_| StorageError::Unavailable( "memory storage lock poisoned".into() ) )?;
        Ok( entries.get( key ).cloned() )
    }


    fn write( &self, key: &str, value: &str ) -> Result<(), StorageError> {
        let mut entries = self.entries
            .lock()
            .map_err( |_| StorageError::Unavailable( "memory storage lock poisoned".into() ) )?;
        entries.insert( key.to_string(), value.to_string() );
        Ok(())
    }
}


impl<T: Storage + ?Sized> Storage for Box<T> {
    fn read( &self, key: &str ) -> Result<Option<String>, StorageError> {
        ( **self ).read( key )
    }


    fn write( &self, key: &str, value: &str ) -> Result<(), StorageError> {
        ( **self ).write( key, value )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_file_storage_missing_entry_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new( dir.path() );
        assert!( storage.read( "watchlist" ).unwrap().is_none() );
    }


    #[test]
    fn test_file_storage_creates_directory_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new( dir.path().join( "nested" ).join( "data" ) );

        storage.write( "favorites", "[]" ).unwrap();

        assert_eq!( storage.read( "favorites" ).unwrap().as_deref(), Some( "[]" ) );
        assert!( dir.path().join( "nested" ).join( "data" ).join( "favorites.json" ).exists() );
    }


    #[test]
    fn test_file_storage_overwrites_entry() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new( dir.path() );

        storage.write( "watchlist", "[1]" ).unwrap();
        storage.write( "watchlist", "[2]" ).unwrap();

        assert_eq!( storage.read( "watchlist" ).unwrap().as_deref(), Some( "[2]" ) );
        assert!( !dir.path().join( "watchlist.json.tmp" ).exists() );
    }


    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new().with_entry( "a", "1" );
        assert_eq!( storage.read( "a" ).unwrap().as_deref(), Some( "1" ) );

        storage.write( "b", "2" ).unwrap();
        assert_eq!( storage.get( "b" ).as_deref(), Some( "2" ) );
    }
}
