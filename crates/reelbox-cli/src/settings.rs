//! Application settings management
//!
//! Persistent preferences live in `settings.json` under the platform config
//! directory. Command-line arguments take precedence over anything here.

use std::fs;
use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Serialize };

use reelbox_core::catalog::TMDB_BASE_URL;
use reelbox_core::music::{ LANGUAGES, SAAVN_BASE_URL };
use reelbox_core::player::DEFAULT_VOLUME;


/// Application settings.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// TMDB API key, used when none is given on the command line
    pub tmdb_api_key: Option<String>,

    pub tmdb_base_url: String,

    pub music_base_url: String,

    /// Volume from the last session (0.0 to 1.0)
    pub volume: f32,

    /// Overrides the default data directory
    pub data_dir: Option<PathBuf>,

    /// Language used by `top` when none is given
    pub language: String,
}


impl Default for Settings {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            tmdb_base_url: TMDB_BASE_URL.to_string(),
            music_base_url: SAAVN_BASE_URL.to_string(),
            volume: DEFAULT_VOLUME,
            data_dir: None,
            language: LANGUAGES[ 0 ].to_string(),
        }
    }
}


impl Settings {
    /// Returns the path to the settings file.
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "reelbox" ).join( "settings.json" ) )
    }


    /// Loads settings from disk, or returns defaults if not found.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some( path ) => Self::load_from( &path ),
            None => Self::default(),
        }
    }


    /// Loads settings from a specific file. Missing or invalid files yield defaults.
    pub fn load_from( path: &Path ) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let settings: Self = match fs::read_to_string( path ) {
            Ok( contents ) => serde_json::from_str( &contents ).unwrap_or_else( |e| {
                tracing::warn!( "Ignoring invalid settings file {:?}: {}", path, e );
                Self::default()
            }),
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                Self::default()
            }
        };

        settings.sanitized()
    }


    /// Saves settings to disk.
    pub fn save( &self ) {
        if let Some( path ) = Self::settings_path() {
            self.save_to( &path );
        }
    }


    /// Saves settings to a specific file.
    pub fn save_to( &self, path: &Path ) {
        // Create parent directory if needed
        if let Some( parent ) = path.parent() {
            if !parent.exists() {
                if let Err( e ) = fs::create_dir_all( parent ) {
                    tracing::warn!( "Failed to create settings directory: {}", e );
                    return;
                }
            }
        }

        match serde_json::to_string_pretty( self ) {
            Ok( json ) => {
                if let Err( e ) = fs::write( path, json ) {
                    tracing::warn!( "Failed to save settings: {}", e );
                }
            }
            Err( e ) => {
                tracing::warn!( "Failed to serialize settings: {}", e );
            }
        }
    }


    fn sanitized( mut self ) -> Self {
        self.volume = if self.volume.is_finite() { self.volume.clamp( 0.0, 1.0 ) } else { DEFAULT_VOLUME };
        if self.tmdb_api_key.as_deref().is_some_and( |k| k.trim().is_empty() ) {
            self.tmdb_api_key = None;
        }
        if self.language.trim().is_empty() {
            self.language = LANGUAGES[ 0 ].to_string();
        }
        self
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from( &dir.path().join( "settings.json" ) );

        assert_eq!( settings, Settings::default() );
        assert_eq!( settings.volume, 0.7 );
        assert_eq!( settings.language, "telugu" );
    }


    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "nested" ).join( "settings.json" );

        let settings = Settings {
            tmdb_api_key: Some( "abc".into() ),
            volume: 0.25,
            language: "hindi".into(),
            ..Settings::default()
        };
        settings.save_to( &path );

        assert_eq!( Settings::load_from( &path ), settings );
    }


    #[test]
    fn test_partial_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );

        fs::write( &path, r#"{ "volume": 3.0, "tmdb_api_key": "  " }"# ).unwrap();
        let settings = Settings::load_from( &path );
        assert_eq!( settings.volume, 1.0 );
        assert_eq!( settings.tmdb_api_key, None );
        assert_eq!( settings.tmdb_base_url, TMDB_BASE_URL );

        fs::write( &path, "not json" ).unwrap();
        assert_eq!( Settings::load_from( &path ), Settings::default() );
    }
}
