//! Line command parsing.
//!
//! The front-end reads one command per line. Commands are parsed here so the
//! grammar can be tested without a terminal. List positions are entered
//! 1-based and stored 0-based.

use std::time::Duration;

use thiserror::Error;

use crate::catalog::{ ContentFilter, SortBy };
use crate::library::MediaType;


/// Errors that can occur during command parsing.
#[derive( Debug, Error, PartialEq )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),
}


/// Parsed line command.
#[derive( Debug, Clone, PartialEq )]
pub enum Command {
    // Music commands
    Search { query: String },
    Top { language: Option<String> },
    Play { index: usize },
    Enqueue { index: usize },
    Remove { index: usize },
    Move { from: usize, to: usize },
    Queue,
    Clear,

    // Playback commands
    Toggle,
    Stop,
    Next,
    Prev,
    Seek { position: Duration },
    Volume { level: Option<u32> },
    Status,

    // Browse commands
    Movies { page: u32 },
    Shows { page: u32 },
    Trending { page: u32 },
    Find { query: String },
    FindShows { query: String },
    Sort { order: SortBy },
    /// `None` shows the active filter
    Filter { filter: Option<ContentFilter> },
    /// `None` shows the selected genres; an empty list clears them
    Genre { genres: Option<Vec<i64>> },
    Genres { media_type: MediaType },

    // Library commands
    Watch { index: usize },
    Like { index: usize },
    Watchlist,
    Favorites,

    Help,
    Quit,
}


impl Command {
    /// Parses a command line.
    ///
    /// @param input - The command line to parse
    ///
    /// @returns The parsed command or an error
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let input = input.trim();
        let mut parts = input.splitn( 2, ' ' );
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );

        match cmd.as_str() {
            // Music commands
            "search" | "s" => {
                let query = args
                    .ok_or_else( || CommandError::MissingArgument( "search query".into() ) )?;
                Ok( Command::Search { query: query.to_string() } )
            }
            "top" => Ok( Command::Top { language: args.map( |s| s.to_lowercase() ) } ),
            "play" => Ok( Command::Play { index: parse_index( args )? } ),
            "enqueue" | "add" | "e" => Ok( Command::Enqueue { index: parse_index( args )? } ),
            "remove" | "rm" => Ok( Command::Remove { index: parse_index( args )? } ),
            "move" | "mv" => {
                let args = args
                    .ok_or_else( || CommandError::MissingArgument( "from and to positions".into() ) )?;
                let ( from, to ) = args
                    .split_once( char::is_whitespace )
                    .ok_or_else( || CommandError::MissingArgument( "destination position".into() ) )?;
                Ok( Command::Move {
                    from: parse_index( Some( from.trim() ) )?,
                    to: parse_index( Some( to.trim() ) )?,
                })
            }
            "queue" | "ls" => Ok( Command::Queue ),
            "clear" | "cl" => Ok( Command::Clear ),

            // Playback commands
            "toggle" | "p" | "pause" => Ok( Command::Toggle ),
            "stop" | "st" => Ok( Command::Stop ),
            "next" | "n" => Ok( Command::Next ),
            "prev" | "previous" | "pr" => Ok( Command::Prev ),
            "seek" | "sk" => {
                let time_str = args
                    .ok_or_else( || CommandError::MissingArgument( "time position".into() ) )?;
                let position = parse_time( time_str )?;
                Ok( Command::Seek { position } )
            }
            "vol" | "volume" => {
                let level = args
                    .map( |s| s.parse::<u32>()
                        .map_err( |_| CommandError::InvalidArgument( format!( "Invalid volume: {}", s ) ) ) )
                    .transpose()?
                    .map( |l| l.min( 100 ) );
                Ok( Command::Volume { level } )
            }
            "status" | "now" => Ok( Command::Status ),

            // Browse commands
            "movies" | "m" => Ok( Command::Movies { page: parse_page( args )? } ),
            "shows" | "tv" => Ok( Command::Shows { page: parse_page( args )? } ),
            "trending" | "t" => Ok( Command::Trending { page: parse_page( args )? } ),
            "find" | "f" => {
                let query = args
                    .ok_or_else( || CommandError::MissingArgument( "title".into() ) )?;
                Ok( Command::Find { query: query.to_string() } )
            }
            "findtv" | "ftv" => {
                let query = args
                    .ok_or_else( || CommandError::MissingArgument( "title".into() ) )?;
                Ok( Command::FindShows { query: query.to_string() } )
            }
            "sort" => {
                let order = args
                    .ok_or_else( || CommandError::MissingArgument( "sort order".into() ) )?
                    .parse()
                    .map_err( CommandError::InvalidArgument )?;
                Ok( Command::Sort { order } )
            }
            "filter" => Ok( Command::Filter { filter: args.map( parse_filter ).transpose()? } ),
            "genre" | "g" => Ok( Command::Genre { genres: args.map( parse_genres ).transpose()? } ),
            "genres" => {
                let media_type = match args.map( |s| s.to_lowercase() ).as_deref() {
                    None | Some( "movie" ) | Some( "movies" ) => MediaType::Movie,
                    Some( "tv" ) | Some( "shows" ) => MediaType::Tv,
                    Some( other ) => {
                        return Err( CommandError::InvalidArgument( format!( "Unknown media type: {}", other ) ) );
                    }
                };
                Ok( Command::Genres { media_type } )
            }

            // Library commands
            "watch" | "w" => Ok( Command::Watch { index: parse_index( args )? } ),
            "like" | "fav" => Ok( Command::Like { index: parse_index( args )? } ),
            "watchlist" | "wl" => Ok( Command::Watchlist ),
            "favorites" | "favs" => Ok( Command::Favorites ),

            "help" | "h" | "?" => Ok( Command::Help ),
            "quit" | "q" | "exit" => Ok( Command::Quit ),

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }


    /// Returns a brief description of the command for help text.
    pub fn description( &self ) -> &'static str {
        match self {
            Command::Search { .. } => "Search songs",
            Command::Top { .. } => "Trending songs in a language",
            Command::Play { .. } => "Play a song from the last list",
            Command::Enqueue { .. } => "Add a song to the queue",
            Command::Remove { .. } => "Remove a queued song",
            Command::Move { .. } => "Move a queued song",
            Command::Queue => "Show the queue",
            Command::Clear => "Clear the queue",
            Command::Toggle => "Play/pause",
            Command::Stop => "Stop playback",
            Command::Next => "Next track",
            Command::Prev => "Previous track",
            Command::Seek { .. } => "Seek to position",
            Command::Volume { .. } => "Set volume (0-100)",
            Command::Status => "Show what is playing",
            Command::Movies { .. } => "Discover movies",
            Command::Shows { .. } => "Discover TV shows",
            Command::Trending { .. } => "Trending today",
            Command::Find { .. } => "Search movies",
            Command::FindShows { .. } => "Search TV shows",
            Command::Sort { .. } => "Set discover order",
            Command::Filter { .. } => "Narrow title listings",
            Command::Genre { .. } => "Pick genres for discover",
            Command::Genres { .. } => "List genres",
            Command::Watch { .. } => "Toggle a title on the watchlist",
            Command::Like { .. } => "Toggle a title in favorites",
            Command::Watchlist => "Show the watchlist",
            Command::Favorites => "Show favorites",
            Command::Help => "Show help",
            Command::Quit => "Quit application",
        }
    }
}


/// Parses a 1-based list position.
fn parse_index( args: Option<&str> ) -> Result<usize, CommandError> {
    let s = args.ok_or_else( || CommandError::MissingArgument( "number".into() ) )?;
    match s.parse::<usize>() {
        Ok( n ) if n > 0 => Ok( n - 1 ),
        _ => Err( CommandError::InvalidArgument( format!( "Invalid number: {}", s ) ) ),
    }
}


/// Parses an optional page number, defaulting to the first page.
fn parse_page( args: Option<&str> ) -> Result<u32, CommandError> {
    match args {
        None => Ok( 1 ),
        Some( s ) => match s.parse::<u32>() {
            Ok( n ) if n > 0 => Ok( n ),
            _ => Err( CommandError::InvalidArgument( format!( "Invalid page: {}", s ) ) ),
        },
    }
}


/// Parses `key=value` pairs into a filter. `off` clears every field.
fn parse_filter( s: &str ) -> Result<ContentFilter, CommandError> {
    let mut filter = ContentFilter::default();
    if s.eq_ignore_ascii_case( "off" ) {
        return Ok( filter );
    }

    for pair in s.split_whitespace() {
        let ( key, value ) = pair
            .split_once( '=' )
            .ok_or_else( || CommandError::InvalidArgument( format!( "Expected key=value, got '{}'", pair ) ) )?;

        match key.to_lowercase().as_str() {
            "year" => {
                if value.len() != 4 || !value.chars().all( |c| c.is_ascii_digit() ) {
                    return Err( CommandError::InvalidArgument( format!( "Invalid year: {}", value ) ) );
                }
                filter.year = Some( value.to_string() );
            }
            "rating" => {
                let rating: f64 = value.parse()
                    .map_err( |_| CommandError::InvalidArgument( format!( "Invalid rating: {}", value ) ) )?;
                filter.min_rating = rating.clamp( 0.0, 10.0 );
            }
            "lang" | "language" => filter.language = Some( value.to_lowercase() ),
            other => return Err( CommandError::InvalidArgument( format!( "Unknown filter: {}", other ) ) ),
        }
    }

    Ok( filter )
}


/// Parses comma or space separated genre ids. `off` clears the selection.
fn parse_genres( s: &str ) -> Result<Vec<i64>, CommandError> {
    if s.eq_ignore_ascii_case( "off" ) {
        return Ok( Vec::new() );
    }

    let mut genres = Vec::new();
    for part in s.split( |c: char| c == ',' || c.is_whitespace() ).filter( |p| !p.is_empty() ) {
        let id: i64 = part.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid genre id: {}", part ) ) )?;
        if !genres.contains( &id ) {
            genres.push( id );
        }
    }
    Ok( genres )
}


/// Parses a time string like "1:30" or "90" into a Duration.
///
/// @param s - Time string in format "MM:SS", "M:SS", or just seconds
///
/// @returns Duration or error
fn parse_time( s: &str ) -> Result<Duration, CommandError> {
    let s = s.trim();

    if let Some(( min, sec )) = s.split_once( ':' ) {
        let minutes: u64 = min.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid minutes: {}", min ) ) )?;
        let seconds: u64 = sec.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid seconds: {}", sec ) ) )?;
        let total = minutes
            .checked_mul( 60 )
            .and_then( |m| m.checked_add( seconds ) )
            .ok_or_else( || CommandError::InvalidArgument( format!( "Time out of range: {}", s ) ) )?;
        Ok( Duration::from_secs( total ) )
    } else {
        let seconds: u64 = s.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid time: {}", s ) ) )?;
        Ok( Duration::from_secs( seconds ) )
    }
}


/// Returns help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Music:
  search <query>   Search songs                  [s]
  top [language]   Trending songs (telugu, hindi, english, ...)
  play <n>         Play song n from the last list
  enqueue <n>      Add song n to the queue       [e]
  remove <n>       Remove song n from the queue  [rm]
  move <n> <m>     Move queued song n to m       [mv]
  queue            Show the queue                [ls]
  clear            Clear the queue

Playback:
  toggle           Play/pause                    [p]
  next / prev      Skip                          [n/pr]
  seek <time>      Seek to position (e.g., 1:30)
  vol [0-100]      Show or set volume
  stop             Stop playback
  status           Show what is playing

Movies & TV:
  trending [page]  Trending today                [t]
  movies [page]    Discover movies               [m]
  shows [page]     Discover TV shows             [tv]
  sort <order>     popular, top-rated, newest, oldest, ...
  filter [k=v ..]  year=2019 rating=7 lang=en, or off
  genres [tv]      List genre ids
  genre [ids|off]  Discover only these genres    [g]
  find <title>     Search movies                 [f]
  findtv <title>   Search TV shows               [ftv]
  watch <n>        Toggle title n on the watchlist [w]
  like <n>         Toggle title n in favorites   [fav]
  watchlist        Show the watchlist            [wl]
  favorites        Show favorites                [favs]

Other:
  help             Show this help                [?]
  quit             Exit reelbox                  [q]"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_search() {
        let cmd = Command::parse( "search  arijit singh " ).unwrap();
        assert_eq!( cmd, Command::Search { query: "arijit singh".into() } );
    }


    #[test]
    fn test_parse_search_requires_query() {
        let result = Command::parse( "s" );
        assert!( matches!( result, Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_top_language() {
        assert_eq!( Command::parse( "top Hindi" ).unwrap(), Command::Top { language: Some( "hindi".into() ) } );
        assert_eq!( Command::parse( "top" ).unwrap(), Command::Top { language: None } );
    }


    #[test]
    fn test_indexes_are_one_based() {
        assert_eq!( Command::parse( "play 1" ).unwrap(), Command::Play { index: 0 } );
        assert_eq!( Command::parse( "e 3" ).unwrap(), Command::Enqueue { index: 2 } );
        assert_eq!( Command::parse( "watch 12" ).unwrap(), Command::Watch { index: 11 } );
        assert!( matches!( Command::parse( "play 0" ), Err( CommandError::InvalidArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "like x" ), Err( CommandError::InvalidArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "play" ), Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_seek() {
        let cmd = Command::parse( "seek 1:30" ).unwrap();
        assert_eq!( cmd, Command::Seek { position: Duration::from_secs( 90 ) } );
    }


    #[test]
    fn test_parse_seek_seconds() {
        let cmd = Command::parse( "seek 45" ).unwrap();
        assert_eq!( cmd, Command::Seek { position: Duration::from_secs( 45 ) } );
    }


    #[test]
    fn test_parse_volume() {
        assert_eq!( Command::parse( "vol 40" ).unwrap(), Command::Volume { level: Some( 40 ) } );
        assert_eq!( Command::parse( "vol 250" ).unwrap(), Command::Volume { level: Some( 100 ) } );
        assert_eq!( Command::parse( "volume" ).unwrap(), Command::Volume { level: None } );
        assert!( Command::parse( "vol loud" ).is_err() );
    }


    #[test]
    fn test_parse_pages() {
        assert_eq!( Command::parse( "movies" ).unwrap(), Command::Movies { page: 1 } );
        assert_eq!( Command::parse( "tv 4" ).unwrap(), Command::Shows { page: 4 } );
        assert_eq!( Command::parse( "trending 2" ).unwrap(), Command::Trending { page: 2 } );
        assert!( Command::parse( "movies 0" ).is_err() );
    }


    #[test]
    fn test_parse_sort() {
        assert_eq!( Command::parse( "sort top-rated" ).unwrap(), Command::Sort { order: SortBy::RatingDesc } );
        assert!( matches!( Command::parse( "sort sideways" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_filter() {
        let cmd = Command::parse( "filter year=2019 rating=7.5 lang=EN" ).unwrap();
        let expected = ContentFilter {
            year: Some( "2019".into() ),
            min_rating: 7.5,
            language: Some( "en".into() ),
        };
        assert_eq!( cmd, Command::Filter { filter: Some( expected ) } );

        assert_eq!( Command::parse( "filter off" ).unwrap(), Command::Filter { filter: Some( ContentFilter::default() ) } );
        assert_eq!( Command::parse( "filter" ).unwrap(), Command::Filter { filter: None } );
        assert!( Command::parse( "filter year=19" ).is_err() );
        assert!( Command::parse( "filter genre=drama" ).is_err() );
    }


    #[test]
    fn test_parse_move() {
        assert_eq!( Command::parse( "move 3 1" ).unwrap(), Command::Move { from: 2, to: 0 } );
        assert_eq!( Command::parse( "mv  2   5" ).unwrap(), Command::Move { from: 1, to: 4 } );
        assert!( matches!( Command::parse( "move 3" ), Err( CommandError::MissingArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "move 0 2" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_genre() {
        assert_eq!( Command::parse( "genre 18,80 18" ).unwrap(), Command::Genre { genres: Some( vec![ 18, 80 ] ) } );
        assert_eq!( Command::parse( "g off" ).unwrap(), Command::Genre { genres: Some( Vec::new() ) } );
        assert_eq!( Command::parse( "genre" ).unwrap(), Command::Genre { genres: None } );
        assert!( matches!( Command::parse( "genre drama" ), Err( CommandError::InvalidArgument( _ ) ) ) );

        assert_eq!( Command::parse( "genres" ).unwrap(), Command::Genres { media_type: MediaType::Movie } );
        assert_eq!( Command::parse( "genres TV" ).unwrap(), Command::Genres { media_type: MediaType::Tv } );
        assert!( Command::parse( "genres music" ).is_err() );
    }


    #[test]
    fn test_parse_seek_out_of_range() {
        let result = Command::parse( "seek 999999999999999999:0" );
        assert!( matches!( result, Err( CommandError::InvalidArgument( _ ) ) ) );
        assert!( Command::parse( "seek 1:x" ).is_err() );
    }


    #[test]
    fn test_parse_aliases() {
        assert_eq!( Command::parse( "P" ).unwrap(), Command::Toggle );
        assert_eq!( Command::parse( "n" ).unwrap(), Command::Next );
        assert_eq!( Command::parse( "wl" ).unwrap(), Command::Watchlist );
        assert_eq!( Command::parse( "q" ).unwrap(), Command::Quit );
    }


    #[test]
    fn test_parse_unknown() {
        let result = Command::parse( "foobar" );
        assert!( matches!( result, Err( CommandError::Unknown( _ ) ) ) );
        assert!( matches!( Command::parse( "   " ), Err( CommandError::Unknown( _ ) ) ) );
    }
}
