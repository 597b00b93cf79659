//! Command-line argument parsing for Reelbox.

use std::path::PathBuf;

use clap::Parser;


/// Reelbox - browse movies and shows, keep a watchlist, play music.
#[derive( Parser, Debug )]
#[command( name = "reelbox" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Directory holding the watchlist, favorites and log file.
    #[arg( short, long )]
    pub data_dir: Option<PathBuf>,

    /// TMDB API key used for movie and TV browsing.
    #[arg( long, env = "TMDB_API_KEY", hide_env_values = true )]
    pub api_key: Option<String>,

    /// Keep the library in memory only; nothing is written to disk.
    #[arg( long )]
    pub ephemeral: bool,

    /// Do not open an audio device.
    #[arg( long )]
    pub no_audio: bool,

    /// Starting volume, 0 to 100.
    #[arg( long, value_parser = clap::value_parser!( u32 ).range( 0..=100 ) )]
    pub volume: Option<u32>,

    /// Log at debug level (RUST_LOG overrides).
    #[arg( short = 'v', long )]
    pub verbose: bool,
}


#[cfg( test )]
mod tests {
    use super::*;
    use clap::CommandFactory;


    #[test]
    fn test_args_definition_is_consistent() {
        Args::command().debug_assert();
    }


    #[test]
    fn test_short_verbose_flag() {
        let args = Args::try_parse_from([ "reelbox", "-v", "--volume", "80" ]).unwrap();
        assert!( args.verbose );
        assert_eq!( args.volume, Some( 80 ) );
    }


    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from([ "reelbox" ]).unwrap();
        assert!( args.data_dir.is_none() );
        assert!( !args.ephemeral );
        assert!( args.volume.is_none() );
    }


    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "reelbox", "--data-dir", "/tmp/rb", "--ephemeral", "--no-audio", "--volume", "35",
        ]).unwrap();

        assert_eq!( args.data_dir, Some( PathBuf::from( "/tmp/rb" ) ) );
        assert!( args.ephemeral );
        assert!( args.no_audio );
        assert_eq!( args.volume, Some( 35 ) );
    }


    #[test]
    fn test_volume_out_of_range() {
        assert!( Args::try_parse_from([ "reelbox", "--volume", "150" ]).is_err() );
    }
}
