//! Reelbox CLI - Line-driven front-end for browsing titles and playing music

mod cli;
mod settings;

use std::fs;
use std::path::{ Path, PathBuf };

use anyhow::{ Context, Result };
use clap::Parser;
use tokio::io::{ AsyncBufReadExt, AsyncWriteExt, BufReader };
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use cli::Args;
use settings::Settings;

use reelbox_core::{
    command::help_text,
    music::DEFAULT_LIMIT,
    track::format_clock,
    AudioOutput, CatalogClient, CatalogPage, Command, ContentFilter, DeviceOutput, DiscoverQuery,
    FileStorage, HttpResolver, LibraryItem, LibrarySet, MediaType, MemoryStorage, MusicClient,
    NullOutput, PlayerStatus, Session, SessionEvent, SortBy, Storage, Track,
};


type AppSession = Session<Box<dyn AudioOutput + Send>, HttpResolver, Box<dyn Storage + Send>>;


/// Something the main loop woke up for.
enum Input {
    Line( Option<String> ),
    Event( Option<SessionEvent> ),
}


/// Application state.
struct App {
    session: AppSession,
    catalog: CatalogClient,
    music: MusicClient,
    settings: Settings,
    should_quit: bool,

    /// Songs from the last search, addressed by `play <n>`
    songs: Vec<Track>,

    /// Titles from the last listing, addressed by `watch <n>` and `like <n>`
    titles: Vec<LibraryItem>,

    sort: SortBy,
    filter: ContentFilter,
    /// Genre ids applied to `movies` and `shows`
    genres: Vec<i64>,

    /// What was last reported, so only changes are printed
    last_reported: Option<( PlayerStatus, Option<String> )>,
}


impl App {
    fn new( args: &Args, settings: Settings, data_dir: &Path ) -> Self {
        let storage: Box<dyn Storage + Send> = if args.ephemeral {
            Box::new( MemoryStorage::new() )
        } else {
            Box::new( FileStorage::new( data_dir ) )
        };

        let volume = args.volume
            .map( |v| v as f32 / 100.0 )
            .unwrap_or( settings.volume );

        let no_audio = args.no_audio;
        let session = Session::open( storage, HttpResolver::new(), volume, move |listener| {
            let output: Box<dyn AudioOutput + Send> = if no_audio {
                Box::new( NullOutput::with_listener( listener ) )
            } else {
                Box::new( DeviceOutput::new( listener ) )
            };
            output
        });

        let api_key = args.api_key.clone()
            .or_else( || settings.tmdb_api_key.clone() )
            .unwrap_or_default();
        let catalog = CatalogClient::with_base_url( settings.tmdb_base_url.clone(), api_key );
        let music = MusicClient::with_base_url( settings.music_base_url.clone() );

        Self {
            session,
            catalog,
            music,
            settings,
            should_quit: false,
            songs: Vec::new(),
            titles: Vec::new(),
            sort: SortBy::default(),
            filter: ContentFilter::default(),
            genres: Vec::new(),
            last_reported: None,
        }
    }


    async fn execute_command( &mut self, input: &str ) {
        if input.trim().is_empty() {
            return;
        }

        match Command::parse( input ) {
            Ok( cmd ) => {
                tracing::debug!( "Command {:?} ({})", cmd, cmd.description() );
                self.run_command( cmd ).await;
            }
            Err( e ) => println!( "{}", e ),
        }
    }


    async fn run_command( &mut self, cmd: Command ) {
        match cmd {
            // Music
            Command::Search { query } => {
                let songs = self.music.search( &query, DEFAULT_LIMIT ).await;
                self.show_songs( songs );
            }
            Command::Top { language } => {
                let language = language.unwrap_or_else( || self.settings.language.clone() );
                let songs = self.music.trending( &language, DEFAULT_LIMIT ).await;
                self.show_songs( songs );
            }
            Command::Play { index } => match self.songs.get( index ).cloned() {
                Some( track ) => self.session.play( track, self.songs.clone() ),
                None => println!( "No song {} in the last list", index + 1 ),
            },
            Command::Enqueue { index } => match self.songs.get( index ).cloned() {
                Some( track ) => {
                    println!( "Queued {}", track.name );
                    self.session.enqueue( track );
                }
                None => println!( "No song {} in the last list", index + 1 ),
            },
            Command::Remove { index } => match self.session.remove_from_queue( index ) {
                Some( track ) => println!( "Removed {}", track.name ),
                None => println!( "No song {} in the queue", index + 1 ),
            },
            Command::Move { from, to } => {
                if self.session.move_in_queue( from, to ) {
                    self.show_queue();
                } else {
                    println!( "No song {} or {} in the queue", from + 1, to + 1 );
                }
            }
            Command::Queue => self.show_queue(),
            Command::Clear => {
                self.session.clear_queue();
                println!( "Queue cleared" );
            }

            // Playback
            Command::Toggle => self.session.toggle_play(),
            Command::Stop => self.session.stop(),
            Command::Next => self.session.play_next(),
            Command::Prev => self.session.play_previous(),
            Command::Seek { position } => self.session.seek_to( position.as_secs_f64() ),
            Command::Volume { level: Some( level ) } => {
                self.session.set_volume( level as f32 / 100.0 );
                self.settings.volume = self.session.state().volume;
                println!( "Volume {}%", level );
            }
            Command::Volume { level: None } => {
                println!( "Volume {}%", ( self.session.state().volume * 100.0 ).round() );
            }
            Command::Status => self.show_status(),

            // Browse
            Command::Movies { page } => {
                if self.require_api_key() {
                    let query = discover_query( self.sort, &self.genres, &self.filter, page );
                    let result = self.catalog.discover( MediaType::Movie, &query ).await;
                    self.show_titles( result, MediaType::Movie );
                }
            }
            Command::Shows { page } => {
                if self.require_api_key() {
                    let query = discover_query( self.sort, &self.genres, &self.filter, page );
                    let result = self.catalog.discover( MediaType::Tv, &query ).await;
                    self.show_titles( result, MediaType::Tv );
                }
            }
            Command::Trending { page } => {
                if self.require_api_key() {
                    let result = self.catalog.trending( page ).await;
                    self.show_titles( result, MediaType::Movie );
                }
            }
            Command::Find { query } => self.find_titles( MediaType::Movie, &query ).await,
            Command::FindShows { query } => self.find_titles( MediaType::Tv, &query ).await,
            Command::Sort { order } => {
                self.sort = order;
                println!( "Discover order: {}", order );
            }
            Command::Filter { filter: Some( filter ) } => {
                self.filter = filter;
                self.show_filter();
            }
            Command::Filter { filter: None } => self.show_filter(),
            Command::Genre { genres: Some( genres ) } => {
                self.genres = genres;
                self.show_genre_selection();
            }
            Command::Genre { genres: None } => self.show_genre_selection(),
            Command::Genres { media_type } => {
                if self.require_api_key() {
                    let genres = self.catalog.genres( media_type ).await;
                    if genres.is_empty() {
                        println!( "No genres available" );
                    }
                    for genre in genres {
                        let mark = if self.genres.contains( &genre.id ) { "*" } else { " " };
                        println!( "{} {:>6}  {}", mark, genre.id, genre.name );
                    }
                }
            }

            // Library
            Command::Watch { index } => self.toggle_title( LibrarySet::Watchlist, index ),
            Command::Like { index } => self.toggle_title( LibrarySet::Favorites, index ),
            Command::Watchlist => self.show_library( LibrarySet::Watchlist ),
            Command::Favorites => self.show_library( LibrarySet::Favorites ),

            Command::Help => println!( "{}", help_text() ),
            Command::Quit => self.should_quit = true,
        }

        self.report_changes();
    }


    fn handle_event( &mut self, event: SessionEvent ) {
        self.session.handle_event( event );
        self.report_changes();
    }


    /// Prints a line when the player status or track changes.
    fn report_changes( &mut self ) {
        let state = self.session.state();
        let status = self.session.status();
        let current = ( status, state.current_track.as_ref().map( |t| t.id.clone() ) );

        if self.last_reported.as_ref() == Some( &current ) {
            return;
        }
        self.last_reported = Some( current );

        match status {
            PlayerStatus::Empty => println!( "Stopped" ),
            PlayerStatus::Failed => println!(
                "Could not play {}: {}",
                track_label( state.current_track.as_ref() ),
                state.error.as_deref().unwrap_or( "unknown error" ),
            ),
            PlayerStatus::Loading => println!( "Loading {}", track_label( state.current_track.as_ref() ) ),
            PlayerStatus::Playing => println!( "Playing {}", track_label( state.current_track.as_ref() ) ),
            PlayerStatus::Paused => println!( "Paused {}", track_label( state.current_track.as_ref() ) ),
        }
    }


    fn require_api_key( &self ) -> bool {
        if !self.catalog.has_api_key() {
            println!( "Set a TMDB API key with --api-key or TMDB_API_KEY" );
        }
        self.catalog.has_api_key()
    }


    async fn find_titles( &mut self, media_type: MediaType, query: &str ) {
        if self.require_api_key() {
            let result = self.catalog.search( media_type, query, 1 ).await;
            let result = self.filter.apply( result );
            self.show_titles( result, media_type );
        }
    }


    fn toggle_title( &mut self, set: LibrarySet, index: usize ) {
        let Some( item ) = self.titles.get( index ).cloned() else {
            println!( "No title {} in the last list", index + 1 );
            return;
        };

        let title = item.title.clone();
        if self.session.library_mut().toggle( set, item ) {
            println!( "Added {} to {}", title, set );
        } else {
            println!( "Removed {} from {}", title, set );
        }
    }


    fn show_songs( &mut self, songs: Vec<Track> ) {
        if songs.is_empty() {
            println!( "No songs found" );
        }

        for ( i, track ) in songs.iter().enumerate() {
            println!( "{:>3}. {} - {} {}", i + 1, track.name, track.artist_line(), track.format_duration() );
        }
        self.songs = songs;
    }


    fn show_titles( &mut self, page: CatalogPage, fallback: MediaType ) {
        if page.is_empty() {
            println!( "Nothing found" );
            self.titles.clear();
            return;
        }

        self.titles = page.results
            .iter()
            .map( |r| r.to_library_item( fallback ) )
            .collect();

        for ( i, item ) in self.titles.iter().enumerate() {
            println!( "{:>3}. {}{}", i + 1, describe_title( item ), self.library_marks( item.id ) );
        }
        println!( "Page {} of {} ({} results)", page.page.max( 1 ), page.total_pages.max( 1 ), page.total_results );
    }


    fn show_library( &mut self, set: LibrarySet ) {
        self.titles = self.session.library().items( set ).to_vec();

        if self.titles.is_empty() {
            println!( "Your {} is empty", set );
            return;
        }

        for ( i, item ) in self.titles.iter().enumerate() {
            println!( "{:>3}. {}{}", i + 1, describe_title( item ), self.library_marks( item.id ) );
        }
    }


    fn library_marks( &self, id: i64 ) -> String {
        let library = self.session.library();
        let mut marks = String::new();
        if library.contains( LibrarySet::Watchlist, id ) {
            marks.push_str( " [watchlist]" );
        }
        if library.contains( LibrarySet::Favorites, id ) {
            marks.push_str( " [favorite]" );
        }
        marks
    }


    fn show_queue( &self ) {
        let queue = self.session.player().queue();
        if queue.is_empty() {
            println!( "Queue is empty" );
            return;
        }

        for ( i, track ) in queue.tracks().iter().enumerate() {
            let marker = if queue.current_index() == Some( i ) { ">" } else { " " };
            println!( "{} {:>3}. {} - {}", marker, i + 1, track.name, track.artist_line() );
        }
    }


    fn show_status( &self ) {
        let state = self.session.state();
        println!( "{:?}: {}", self.session.status(), track_label( state.current_track.as_ref() ) );
        if state.current_track.is_some() {
            println!( "  {} / {}", format_clock( state.position_secs ), format_clock( state.duration_secs ) );
        }
        println!( "  Volume {}%", ( state.volume * 100.0 ).round() );
    }


    fn show_filter( &self ) {
        if self.filter.is_empty() {
            println!( "No filter" );
            return;
        }

        let mut parts = Vec::new();
        if let Some( year ) = &self.filter.year {
            parts.push( format!( "year={}", year ) );
        }
        if self.filter.min_rating > 0.0 {
            parts.push( format!( "rating>={}", self.filter.min_rating ) );
        }
        if let Some( language ) = &self.filter.language {
            parts.push( format!( "lang={}", language ) );
        }
        println!( "Filter: {}", parts.join( " " ) );
    }


    fn show_genre_selection( &self ) {
        if self.genres.is_empty() {
            println!( "All genres" );
            return;
        }

        let ids: Vec<String> = self.genres.iter().map( |g| g.to_string() ).collect();
        println!( "Genres: {}", ids.join( "," ) );
    }


    fn shutdown( mut self ) {
        self.settings.volume = self.session.state().volume;
        self.settings.save();
        self.session.shutdown();
    }
}


fn track_label( track: Option<&Track> ) -> String {
    match track {
        Some( t ) => format!( "{} - {}", t.name, t.artist_line() ),
        None => "nothing".to_string(),
    }
}


/// Discover request for the current browse settings.
fn discover_query( sort: SortBy, genres: &[i64], filter: &ContentFilter, page: u32 ) -> DiscoverQuery {
    DiscoverQuery { sort, genres: genres.to_vec(), ..DiscoverQuery::page( page ) }.narrowed_by( filter )
}


fn describe_title( item: &LibraryItem ) -> String {
    let year = item.year().map( |y| format!( " ({})", y ) ).unwrap_or_default();
    format!( "{}{} [{}] {:.1}", item.title, year, item.media_type, item.vote_average )
}


/// Picks the data directory: command line, then settings, then the platform default.
fn resolve_data_dir( args: &Args, settings: &Settings ) -> PathBuf {
    args.data_dir.clone()
        .or_else( || settings.data_dir.clone() )
        .or_else( FileStorage::default_dir )
        .unwrap_or_else( || PathBuf::from( ".reelbox" ) )
}


/// Sends tracing output to `reelbox.log` in the data directory.
fn init_logging( data_dir: &Path, verbose: bool ) -> Result<WorkerGuard> {
    fs::create_dir_all( data_dir )
        .with_context( || format!( "creating data directory {:?}", data_dir ) )?;

    let file_appender = tracing_appender::rolling::never( data_dir, "reelbox.log" );
    let ( writer, guard ) = tracing_appender::non_blocking( file_appender );

    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new( default_level ) ) )
        .with_writer( writer )
        .with_ansi( false )
        .init();

    Ok( guard )
}


async fn prompt() -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all( b"> " ).await?;
    stdout.flush().await?;
    Ok(())
}


#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load();
    let data_dir = resolve_data_dir( &args, &settings );

    let _log_guard = init_logging( &data_dir, args.verbose )?;
    tracing::info!( "Starting reelbox, data in {:?}", data_dir );

    let mut app = App::new( &args, settings, &data_dir );

    println!( "reelbox - type 'help' for commands" );
    let mut lines = BufReader::new( tokio::io::stdin() ).lines();
    prompt().await?;

    // Main loop
    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line( line? ),
            event = app.session.next_event() => Input::Event( event ),
        };

        match input {
            Input::Line( Some( line ) ) => {
                app.execute_command( &line ).await;
                if app.should_quit {
                    break;
                }
                prompt().await?;
            }
            Input::Line( None ) => break,
            Input::Event( Some( event ) ) => app.handle_event( event ),
            Input::Event( None ) => break,
        }
    }

    app.shutdown();
    tracing::info!( "Exiting" );

    Ok(())
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_describe_title() {
        let item = LibraryItem {
            id: 1,
            title: "Dark".into(),
            poster_path: None,
            media_type: MediaType::Tv,
            vote_average: 8.44,
            release_date: "2017-12-01".into(),
        };
        assert_eq!( describe_title( &item ), "Dark (2017) [tv] 8.4" );
    }


    #[test]
    fn test_data_dir_precedence() {
        let settings = Settings { data_dir: Some( PathBuf::from( "/from/settings" ) ), ..Settings::default() };

        let args = Args::try_parse_from([ "reelbox", "--data-dir", "/from/args" ]).unwrap();
        assert_eq!( resolve_data_dir( &args, &settings ), PathBuf::from( "/from/args" ) );

        let args = Args::try_parse_from([ "reelbox" ]).unwrap();
        assert_eq!( resolve_data_dir( &args, &settings ), PathBuf::from( "/from/settings" ) );
    }


    #[test]
    fn test_discover_query_uses_browse_settings() {
        let filter = ContentFilter { year: Some( "2015".into() ), ..ContentFilter::default() };
        let query = discover_query( SortBy::RatingDesc, &[ 35, 18 ], &filter, 3 );

        assert_eq!( query.sort, SortBy::RatingDesc );
        assert_eq!( query.genres, vec![ 35, 18 ] );
        assert_eq!( query.year_from, Some( 2015 ) );
        assert_eq!( query.year_to, Some( 2015 ) );
        assert_eq!( query.page, 3 );

        let query = discover_query( SortBy::default(), &[], &ContentFilter::default(), 1 );
        assert_eq!( query, DiscoverQuery::default() );
    }


    #[test]
    fn test_track_label() {
        assert_eq!( track_label( None ), "nothing" );

        let track = Track { name: "Song".into(), artists: vec![ "A".into() ], ..Track::default() };
        assert_eq!( track_label( Some( &track ) ), "Song - A" );
    }
}
