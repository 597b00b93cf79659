//! Application session
//!
//! One `Session` exists per run. It owns the library, the player and the
//! stream resolver, and funnels everything asynchronous (resolution results
//! and output events) through a single channel so state only ever changes on
//! the task that drives [`Session::next_event`].

use std::sync::Arc;

use tokio::sync::mpsc::{ self, UnboundedReceiver, UnboundedSender };

use crate::library::LibraryStore;
use crate::output::{ AudioOutput, LoadToken, OutputEvent, OutputListener };
use crate::player::{ LoadRequest, Player, PlaybackState, PlayerStatus };
use crate::resolver::{ ResolveError, StreamResolver };
use crate::storage::Storage;
use crate::track::Track;


/// Something that happened outside the event loop.
#[derive( Debug, Clone, PartialEq )]
pub enum SessionEvent {
    /// Reported by the audio output.
    Output( OutputEvent ),

    /// A stream resolution finished.
    Resolved {
        token: LoadToken,
        result: Result<String, ResolveError>,
    },
}


/// Application-scoped state container.
pub struct Session<O, R, S>
where
    O: AudioOutput,
    R: StreamResolver,
    S: Storage,
{
    library: LibraryStore<S>,
    player: Player<O>,
    resolver: Arc<R>,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
}


impl<O, R, S> Session<O, R, S>
where
    O: AudioOutput,
    R: StreamResolver,
    S: Storage,
{
    /// Opens the library and builds the output.
    ///
    /// `make_output` receives the listener the output must report through.
    pub fn open<F>( storage: S, resolver: R, volume: f32, make_output: F ) -> Self
    where
        F: FnOnce( OutputListener ) -> O,
    {
        let ( events_tx, events_rx ) = mpsc::unbounded_channel();

        let output_tx = events_tx.clone();
        let listener: OutputListener = Arc::new( move |event| {
            // The receiver only goes away with the session
            let _ = output_tx.send( SessionEvent::Output( event ) );
        });

        let library = LibraryStore::open( storage );
        let player = Player::new( make_output( listener ), volume );

        tracing::info!( "Session opened" );

        Self {
            library,
            player,
            resolver: Arc::new( resolver ),
            events_tx,
            events_rx,
        }
    }


    pub fn library( &self ) -> &LibraryStore<S> {
        &self.library
    }


    pub fn library_mut( &mut self ) -> &mut LibraryStore<S> {
        &mut self.library
    }


    pub fn player( &self ) -> &Player<O> {
        &self.player
    }


    pub fn state( &self ) -> &PlaybackState {
        self.player.state()
    }


    pub fn status( &self ) -> PlayerStatus {
        self.player.status()
    }


    /// Plays `track`, replacing the queue when `queue` is non-empty.
    pub fn play( &mut self, track: Track, queue: Vec<Track> ) {
        let request = self.player.play( track, queue );
        self.dispatch( request );
    }


    pub fn play_next( &mut self ) {
        if let Some( request ) = self.player.play_next() {
            self.dispatch( request );
        }
    }


    pub fn play_previous( &mut self ) {
        if let Some( request ) = self.player.play_previous() {
            self.dispatch( request );
        }
    }


    pub fn toggle_play( &mut self ) {
        if let Some( request ) = self.player.toggle_play() {
            self.dispatch( request );
        }
    }


    pub fn seek_to( &mut self, position_secs: f64 ) {
        self.player.seek_to( position_secs );
    }


    pub fn set_volume( &mut self, volume: f32 ) {
        self.player.set_volume( volume );
    }


    pub fn enqueue( &mut self, track: Track ) {
        self.player.add_to_queue( track );
    }


    pub fn remove_from_queue( &mut self, index: usize ) -> Option<Track> {
        self.player.remove_from_queue( index )
    }


    pub fn move_in_queue( &mut self, from: usize, to: usize ) -> bool {
        self.player.move_in_queue( from, to )
    }


    pub fn clear_queue( &mut self ) {
        self.player.clear_queue();
    }


    pub fn stop( &mut self ) {
        self.player.stop();
    }


    /// Waits for the next asynchronous event.
    pub async fn next_event( &mut self ) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }


    /// Applies an event to the player.
    pub fn handle_event( &mut self, event: SessionEvent ) {
        match event {
            SessionEvent::Output( event ) => {
                if let Some( request ) = self.player.handle_output_event( event ) {
                    self.dispatch( request );
                }
            }
            SessionEvent::Resolved { token, result } => {
                self.player.complete_load( token, result );
            }
        }
    }


    /// Applies every event that is already queued.
    ///
    /// @returns The number of events handled
    pub fn drain_pending( &mut self ) -> usize {
        let mut handled = 0;
        while let Ok( event ) = self.events_rx.try_recv() {
            self.handle_event( event );
            handled += 1;
        }
        handled
    }


    /// Stops playback and releases the output.
    pub fn shutdown( mut self ) {
        self.player.stop();
        tracing::info!( "Session closed" );
    }


    fn dispatch( &self, request: LoadRequest ) {
        let resolver = Arc::clone( &self.resolver );
        let tx = self.events_tx.clone();

        tokio::spawn( async move {
            let result = resolver.resolve( &request.track ).await;
            let _ = tx.send( SessionEvent::Resolved { token: request.token, result } );
        });
    }
}


#[cfg( test )]
mod tests {
    use std::collections::{ HashMap, HashSet };
    use std::time::Duration;

    use super::*;
    use crate::library::{ LibraryItem, LibrarySet, MediaType };
    use crate::output::OutputEventKind;
    use crate::storage::MemoryStorage;


    #[derive( Default )]
    struct FakeResolver {
        delays_ms: HashMap<String, u64>,
        failing: HashSet<String>,
    }


    impl StreamResolver for FakeResolver {
        async fn resolve( &self, track: &Track ) -> Result<String, ResolveError> {
            if let Some( ms ) = self.delays_ms.get( &track.id ) {
                tokio::time::sleep( Duration::from_millis( *ms ) ).await;
            }
            if self.failing.contains( &track.id ) {
                return Err( ResolveError::NoSource( track.id.clone() ) );
            }
            Ok( format!( "mem://{}", track.id ) )
        }
    }


    /// Records loads and can report events as the real device would.
    struct FakeOutput {
        listener: OutputListener,
        loads: Vec<( LoadToken, String )>,
        stopped: usize,
    }


    impl FakeOutput {
        fn emit( &self, kind: OutputEventKind ) {
            if let Some(( token, _ )) = self.loads.last() {
                ( self.listener )( OutputEvent::new( *token, kind ) );
            }
        }


        fn urls( &self ) -> Vec<&str> {
            self.loads.iter().map( |( _, u )| u.as_str() ).collect()
        }
    }


    impl AudioOutput for FakeOutput {
        fn load( &mut self, token: LoadToken, url: &str ) {
            self.loads.push(( token, url.to_string() ));
        }

        fn play( &mut self ) {}

        fn pause( &mut self ) {}

        fn seek( &mut self, _position_secs: f64 ) {}

        fn set_volume( &mut self, _volume: f32 ) {}

        fn stop( &mut self ) {
            self.stopped += 1;
        }
    }


    type TestSession = Session<FakeOutput, FakeResolver, MemoryStorage>;


    fn open( resolver: FakeResolver ) -> TestSession {
        Session::open( MemoryStorage::new(), resolver, 0.7, |listener| FakeOutput {
            listener,
            loads: Vec::new(),
            stopped: 0,
        })
    }


    fn track( id: &str ) -> Track {
        Track { id: id.into(), name: id.to_uppercase(), ..Track::default() }
    }


    fn tracks( ids: &[&str] ) -> Vec<Track> {
        ids.iter().map( |id| track( id ) ).collect()
    }


    async fn step( session: &mut TestSession ) -> SessionEvent {
        let event = tokio::time::timeout( Duration::from_secs( 5 ), session.next_event() )
            .await
            .expect( "timed out waiting for session event" )
            .expect( "event channel closed" );
        session.handle_event( event.clone() );
        event
    }


    #[tokio::test]
    async fn test_play_resolves_then_loads() {
        let mut session = open( FakeResolver::default() );
        session.play( track( "a" ), tracks( &[ "a", "b" ] ) );
        assert_eq!( session.status(), PlayerStatus::Loading );

        let event = step( &mut session ).await;
        assert!( matches!( event, SessionEvent::Resolved { result: Ok( _ ), .. } ) );
        assert_eq!( session.player().output().urls(), vec![ "mem://a" ] );

        session.player().output().emit( OutputEventKind::CanPlay );
        step( &mut session ).await;
        assert_eq!( session.status(), PlayerStatus::Playing );
    }


    #[tokio::test]
    async fn test_reporting_null_output_reaches_playing() {
        let mut session = Session::open(
            MemoryStorage::new(),
            FakeResolver::default(),
            0.7,
            crate::output::NullOutput::with_listener,
        );
        session.play( track( "a" ), tracks( &[ "a" ] ) );

        let event = tokio::time::timeout( Duration::from_secs( 5 ), session.next_event() )
            .await
            .expect( "timed out waiting for session event" )
            .expect( "event channel closed" );
        session.handle_event( event );
        assert_eq!( session.drain_pending(), 2 );

        assert_eq!( session.status(), PlayerStatus::Playing );
        assert_eq!( session.player().output().loaded().map( |( _, url )| url ), Some( "mem://a" ) );
        assert!( session.player().output().is_playing() );
    }


    #[tokio::test]
    async fn test_last_play_wins() {
        let mut resolver = FakeResolver::default();
        resolver.delays_ms.insert( "slow".into(), 50 );
        let mut session = open( resolver );

        session.play( track( "slow" ), tracks( &[ "slow", "fast" ] ) );
        session.play( track( "fast" ), Vec::new() );

        step( &mut session ).await;
        step( &mut session ).await;

        assert_eq!( session.player().output().urls(), vec![ "mem://fast" ] );
        assert_eq!( session.state().current_track.as_ref().map( |t| t.id.as_str() ), Some( "fast" ) );
    }


    #[tokio::test]
    async fn test_resolution_failure_is_reported_as_failed() {
        let mut resolver = FakeResolver::default();
        resolver.failing.insert( "bad".into() );
        let mut session = open( resolver );

        session.play( track( "bad" ), tracks( &[ "bad", "good" ] ) );
        step( &mut session ).await;

        assert_eq!( session.status(), PlayerStatus::Failed );
        assert!( session.player().output().loads.is_empty() );

        session.play_next();
        step( &mut session ).await;
        assert_eq!( session.player().output().urls(), vec![ "mem://good" ] );
    }


    #[tokio::test]
    async fn test_end_of_track_advances() {
        let mut session = open( FakeResolver::default() );
        session.play( track( "a" ), tracks( &[ "a", "b" ] ) );
        step( &mut session ).await;

        session.player().output().emit( OutputEventKind::Ended );
        let event = step( &mut session ).await;
        assert!( matches!( event, SessionEvent::Output( _ ) ) );

        step( &mut session ).await;
        assert_eq!( session.player().output().urls(), vec![ "mem://a", "mem://b" ] );
    }


    #[tokio::test]
    async fn test_drain_pending_applies_queued_events() {
        let mut session = open( FakeResolver::default() );
        session.play( track( "a" ), tracks( &[ "a" ] ) );
        step( &mut session ).await;

        session.player().output().emit( OutputEventKind::MetadataReady( 120.0 ) );
        session.player().output().emit( OutputEventKind::TimeUpdate( 30.0 ) );

        assert_eq!( session.drain_pending(), 2 );
        assert_eq!( session.state().duration_secs, 120.0 );
        assert_eq!( session.state().position_secs, 30.0 );
    }


    #[tokio::test]
    async fn test_library_and_shutdown() {
        let mut session = open( FakeResolver::default() );
        let item = LibraryItem {
            id: 42,
            title: "Arrival".into(),
            poster_path: None,
            media_type: MediaType::Movie,
            vote_average: 7.6,
            release_date: "2016-11-10".into(),
        };

        assert!( session.library_mut().toggle( LibrarySet::Watchlist, item ) );
        assert!( session.library().contains( LibrarySet::Watchlist, 42 ) );
        assert!( session.library().storage().get( "watchlist" ).is_some() );

        session.play( track( "a" ), tracks( &[ "a" ] ) );
        session.shutdown();
    }
}
