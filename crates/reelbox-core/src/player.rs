//! Core player implementation
//!
//! The Player owns the output adapter and the queue, and is the only place
//! playback state changes. Loads go through two steps: `play` (or a skip)
//! issues a [`LoadRequest`] that the caller resolves to a stream URL, then
//! `complete_load` hands that URL to the output. Every load carries a fresh
//! [`LoadToken`]; results and output events tagged with anything else are
//! dropped, so the most recent request always wins.

use crate::output::{ AudioOutput, LoadToken, OutputEvent, OutputEventKind };
use crate::queue::Queue;
use crate::resolver::ResolveError;
use crate::track::Track;


/// Volume used until the user picks one.
pub const DEFAULT_VOLUME: f32 = 0.7;


/// Observable playback state.
#[derive( Debug, Clone, PartialEq )]
pub struct PlaybackState {
    pub current_track: Option<Track>,
    pub is_playing: bool,
    /// 0.0 to 1.0
    pub volume: f32,
    pub position_secs: f64,
    /// 0 until the output reports it
    pub duration_secs: f64,
    pub is_loading: bool,
    /// Set when the current track could not be resolved or played.
    pub error: Option<String>,
}


impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_track: None,
            is_playing: false,
            volume: DEFAULT_VOLUME,
            position_secs: 0.0,
            duration_secs: 0.0,
            is_loading: false,
            error: None,
        }
    }
}


/// Coarse player status derived from [`PlaybackState`].
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum PlayerStatus {
    Empty,
    Loading,
    Paused,
    Playing,
    Failed,
}


/// A track waiting for its stream URL.
#[derive( Debug, Clone, PartialEq )]
pub struct LoadRequest {
    pub token: LoadToken,
    pub track: Track,
}


/// Queue-driven audio player.
pub struct Player<O: AudioOutput> {
    output: O,
    queue: Queue,
    state: PlaybackState,
    /// Token of the current load; `None` when nothing is loaded or loading
    token: Option<LoadToken>,
    next_token: u64,
    /// The current load has not reached the output yet
    resolving: bool,
    /// The output played the current source to its end
    finished: bool,
}


impl<O: AudioOutput> Player<O> {
    /// Creates a player around `output` with the given starting volume.
    pub fn new( mut output: O, volume: f32 ) -> Self {
        let volume = clamp_volume( volume );
        output.set_volume( volume );

        Self {
            output,
            queue: Queue::new(),
            state: PlaybackState { volume, ..PlaybackState::default() },
            token: None,
            next_token: 0,
            resolving: false,
            finished: false,
        }
    }


    /// Starts `track`, replacing the queue with `queue` when it is non-empty.
    pub fn play( &mut self, track: Track, queue: Vec<Track> ) -> LoadRequest {
        if !queue.is_empty() {
            self.queue.replace( queue );
        }
        self.queue.select( &track.id );

        self.start( track )
    }


    /// Applies the outcome of resolving a load.
    ///
    /// Results for anything but the current load are ignored.
    pub fn complete_load( &mut self, token: LoadToken, result: Result<String, ResolveError> ) {
        if self.token != Some( token ) || !self.resolving {
            tracing::debug!( "Ignoring stale resolution {}", token );
            return;
        }
        self.resolving = false;

        match result {
            Ok( url ) => {
                if let Some( track ) = self.state.current_track.as_mut() {
                    track.stream_url = Some( url.clone() );
                }

                self.output.set_volume( self.state.volume );
                self.output.load( token, &url );

                // Seeks made while resolving
                if self.state.position_secs > 0.0 {
                    self.output.seek( self.state.position_secs );
                }
                if self.state.is_playing {
                    self.output.play();
                }
            }
            Err( e ) => self.fail( e.to_string() ),
        }
    }


    /// Flips between playing and paused.
    ///
    /// Resuming a track that already played to its end starts it over, in
    /// which case a new load is returned.
    pub fn toggle_play( &mut self ) -> Option<LoadRequest> {
        if self.state.current_track.is_none() || self.state.error.is_some() {
            return None;
        }

        if self.finished && !self.state.is_playing {
            let track = self.state.current_track.clone()?;
            return Some( self.start( track ) );
        }

        self.state.is_playing = !self.state.is_playing;
        tracing::info!( "Playback {}", if self.state.is_playing { "resumed" } else { "paused" } );

        // While resolving, the intent is applied once the load completes
        if !self.resolving {
            if self.state.is_playing {
                self.output.play();
            } else {
                self.output.pause();
            }
        }

        None
    }


    /// Skips to the next track, wrapping to the first.
    pub fn play_next( &mut self ) -> Option<LoadRequest> {
        if self.queue.is_empty() {
            return None;
        }

        self.sync_cursor();
        let track = self.queue.advance()?.clone();
        Some( self.start( track ) )
    }


    /// Skips to the previous track, wrapping to the last.
    pub fn play_previous( &mut self ) -> Option<LoadRequest> {
        if self.queue.is_empty() {
            return None;
        }

        self.sync_cursor();
        let track = self.queue.retreat()?.clone();
        Some( self.start( track ) )
    }


    /// Jumps to a position in seconds, clamped to the track.
    pub fn seek_to( &mut self, position_secs: f64 ) {
        if self.state.current_track.is_none() || self.state.error.is_some() {
            return;
        }

        let position = self.clamp_position( position_secs );
        self.state.position_secs = position;

        if !self.resolving && self.token.is_some() {
            self.output.seek( position );
        }
    }


    /// Sets the volume, clamped to 0.0 to 1.0.
    pub fn set_volume( &mut self, volume: f32 ) {
        let volume = clamp_volume( volume );
        self.state.volume = volume;
        self.output.set_volume( volume );
    }


    /// Appends a track to the queue.
    pub fn add_to_queue( &mut self, track: Track ) {
        self.queue.add( track );
    }


    /// Removes the track at `index`. Emptying the queue stops playback.
    pub fn remove_from_queue( &mut self, index: usize ) -> Option<Track> {
        let removed = self.queue.remove( index )?;
        if self.queue.is_empty() {
            self.stop();
        }
        Some( removed )
    }


    /// Moves a queued track to another position. The current track keeps
    /// playing wherever it ends up.
    pub fn move_in_queue( &mut self, from: usize, to: usize ) -> bool {
        let moved = self.queue.move_track( from, to );
        if moved {
            tracing::debug!( "Moved queue entry {} to {}", from, to );
        }
        moved
    }


    /// Empties the queue and stops playback.
    pub fn clear_queue( &mut self ) {
        self.queue.clear();
        self.stop();
    }


    /// Drops the current track. Volume is kept.
    pub fn stop( &mut self ) {
        self.output.stop();
        self.token = None;
        self.resolving = false;
        self.finished = false;
        self.queue.deselect();
        self.state = PlaybackState { volume: self.state.volume, ..PlaybackState::default() };
        tracing::info!( "Playback stopped" );
    }


    /// Applies an event reported by the output.
    ///
    /// Returns the follow-up load when the event advanced the queue.
    pub fn handle_output_event( &mut self, event: OutputEvent ) -> Option<LoadRequest> {
        if self.token != Some( event.token ) {
            tracing::debug!( "Ignoring stale output event {} {:?}", event.token, event.kind );
            return None;
        }

        match event.kind {
            OutputEventKind::TimeUpdate( position ) => {
                if position.is_finite() {
                    self.state.position_secs = self.clamp_position( position );
                }
                None
            }
            OutputEventKind::MetadataReady( duration ) => {
                self.state.duration_secs = if duration.is_finite() { duration.max( 0.0 ) } else { 0.0 };
                self.state.position_secs = self.clamp_position( self.state.position_secs );
                self.state.is_loading = false;
                None
            }
            OutputEventKind::CanPlay => {
                self.state.is_loading = false;
                None
            }
            OutputEventKind::Ended => {
                tracing::info!( "Track ended" );
                self.state.is_playing = false;
                self.state.is_loading = false;
                self.state.position_secs = self.state.duration_secs;
                self.finished = true;
                self.play_next()
            }
            OutputEventKind::Error( reason ) => {
                self.fail( reason );
                None
            }
        }
    }


    /// Gets the playback state.
    pub fn state( &self ) -> &PlaybackState {
        &self.state
    }


    /// Gets the derived status.
    pub fn status( &self ) -> PlayerStatus {
        if self.state.error.is_some() {
            PlayerStatus::Failed
        } else if self.state.current_track.is_none() {
            PlayerStatus::Empty
        } else if self.state.is_loading {
            PlayerStatus::Loading
        } else if self.state.is_playing {
            PlayerStatus::Playing
        } else {
            PlayerStatus::Paused
        }
    }


    /// Gets the queue.
    pub fn queue( &self ) -> &Queue {
        &self.queue
    }


    /// Gets the output adapter.
    pub fn output( &self ) -> &O {
        &self.output
    }


    /// Token of the current load, if any.
    pub fn current_token( &self ) -> Option<LoadToken> {
        self.token
    }


    fn start( &mut self, track: Track ) -> LoadRequest {
        self.output.stop();

        self.next_token += 1;
        let token = LoadToken( self.next_token );
        self.token = Some( token );
        self.resolving = true;
        self.finished = false;

        tracing::info!( "Loading {} \"{}\" ({})", token, track.name, track.id );

        self.state.current_track = Some( track.clone() );
        self.state.is_playing = true;
        self.state.is_loading = true;
        self.state.error = None;
        self.state.position_secs = 0.0;
        self.state.duration_secs = 0.0;

        LoadRequest { token, track }
    }


    fn fail( &mut self, reason: String ) {
        let id = self.state.current_track.as_ref().map( |t| t.id.as_str() ).unwrap_or( "?" );
        tracing::warn!( "Playback of {} failed: {}", id, reason );

        self.output.stop();
        self.token = None;
        self.resolving = false;
        self.state.error = Some( reason );
        self.state.is_loading = false;
        self.state.is_playing = false;
    }


    /// Points the queue cursor at the current track, if it is queued.
    fn sync_cursor( &mut self ) {
        match self.state.current_track.as_ref().map( |t| t.id.clone() ) {
            Some( id ) => {
                self.queue.select( &id );
            }
            None => self.queue.deselect(),
        }
    }


    fn clamp_position( &self, position: f64 ) -> f64 {
        let position = position.max( 0.0 );
        if self.state.duration_secs > 0.0 {
            position.min( self.state.duration_secs )
        } else {
            position
        }
    }
}


fn clamp_volume( volume: f32 ) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp( 0.0, 1.0 )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[derive( Debug, Clone, PartialEq )]
    enum Call {
        Load( LoadToken, String ),
        Play,
        Pause,
        Seek( f64 ),
        Volume( f32 ),
        Stop,
    }


    #[derive( Debug, Default )]
    struct RecordingOutput {
        calls: Vec<Call>,
    }


    impl RecordingOutput {
        fn loads( &self ) -> Vec<( LoadToken, String )> {
            self.calls
                .iter()
                .filter_map( |c| match c {
                    Call::Load( t, u ) => Some(( *t, u.clone() )),
                    _ => None,
                })
                .collect()
        }


        fn last( &self ) -> Option<&Call> {
            self.calls.last()
        }
    }


    impl AudioOutput for RecordingOutput {
        fn load( &mut self, token: LoadToken, url: &str ) {
            self.calls.push( Call::Load( token, url.to_string() ) );
        }

        fn play( &mut self ) {
            self.calls.push( Call::Play );
        }

        fn pause( &mut self ) {
            self.calls.push( Call::Pause );
        }

        fn seek( &mut self, position_secs: f64 ) {
            self.calls.push( Call::Seek( position_secs ) );
        }

        fn set_volume( &mut self, volume: f32 ) {
            self.calls.push( Call::Volume( volume ) );
        }

        fn stop( &mut self ) {
            self.calls.push( Call::Stop );
        }
    }


    fn track( id: &str ) -> Track {
        Track::from_stream( id, id.to_uppercase(), format!( "https://cdn/{}.mp3", id ) )
    }


    fn tracks( ids: &[&str] ) -> Vec<Track> {
        ids.iter().map( |id| track( id ) ).collect()
    }


    fn player() -> Player<RecordingOutput> {
        Player::new( RecordingOutput::default(), DEFAULT_VOLUME )
    }


    fn current_id<O: AudioOutput>( p: &Player<O> ) -> Option<&str> {
        p.state().current_track.as_ref().map( |t| t.id.as_str() )
    }


    /// Plays `id` from a queue of `ids` and completes its load.
    fn playing( ids: &[&str], id: &str ) -> ( Player<RecordingOutput>, LoadToken ) {
        let mut p = player();
        let req = p.play( track( id ), tracks( ids ) );
        p.complete_load( req.token, Ok( format!( "https://cdn/{}.mp3", id ) ) );
        p.handle_output_event( OutputEvent::new( req.token, OutputEventKind::MetadataReady( 200.0 ) ) );
        p.handle_output_event( OutputEvent::new( req.token, OutputEventKind::CanPlay ) );
        ( p, req.token )
    }


    #[test]
    fn test_new_player_is_empty() {
        let p = player();
        assert_eq!( p.status(), PlayerStatus::Empty );
        assert_eq!( p.state().volume, 0.7 );
        assert_eq!( p.output().last(), Some( &Call::Volume( 0.7 ) ) );
    }


    #[test]
    fn test_play_goes_through_loading() {
        let mut p = player();
        let req = p.play( track( "a" ), tracks( &[ "a", "b" ] ) );

        assert_eq!( req.track.id, "a" );
        assert_eq!( p.status(), PlayerStatus::Loading );
        assert!( p.state().is_playing );
        assert_eq!( p.queue().current_index(), Some( 0 ) );

        p.complete_load( req.token, Ok( "https://cdn/a.mp3".into() ) );
        assert_eq!( p.output().loads(), vec![ ( req.token, "https://cdn/a.mp3".to_string() ) ] );
        assert_eq!( p.output().last(), Some( &Call::Play ) );
        assert_eq!( p.status(), PlayerStatus::Loading );

        p.handle_output_event( OutputEvent::new( req.token, OutputEventKind::CanPlay ) );
        assert_eq!( p.status(), PlayerStatus::Playing );
    }


    #[test]
    fn test_play_with_empty_queue_keeps_existing_queue() {
        let ( mut p, _ ) = playing( &[ "a", "b", "c" ], "a" );

        p.play( track( "b" ), Vec::new() );

        assert_eq!( p.queue().len(), 3 );
        assert_eq!( p.queue().current_index(), Some( 1 ) );
    }


    #[test]
    fn test_stale_resolution_is_ignored() {
        let mut p = player();
        let first = p.play( track( "a" ), tracks( &[ "a", "b" ] ) );
        let second = p.play( track( "b" ), Vec::new() );

        p.complete_load( second.token, Ok( "https://cdn/b.mp3".into() ) );
        p.complete_load( first.token, Ok( "https://cdn/a.mp3".into() ) );

        assert_eq!( p.output().loads(), vec![ ( second.token, "https://cdn/b.mp3".to_string() ) ] );
        assert_eq!( current_id( &p ), Some( "b" ) );
    }


    #[test]
    fn test_stale_output_events_are_ignored() {
        let ( mut p, old ) = playing( &[ "a", "b" ], "a" );
        p.play_next();

        assert!( p.handle_output_event( OutputEvent::new( old, OutputEventKind::Ended ) ).is_none() );
        p.handle_output_event( OutputEvent::new( old, OutputEventKind::Error( "boom".into() ) ) );

        assert_eq!( current_id( &p ), Some( "b" ) );
        assert_eq!( p.status(), PlayerStatus::Loading );
    }


    #[test]
    fn test_resolution_failure_enters_failed_state() {
        let mut p = player();
        let req = p.play( track( "a" ), tracks( &[ "a", "b" ] ) );

        p.complete_load( req.token, Err( ResolveError::NoSource( "a".into() ) ) );

        assert_eq!( p.status(), PlayerStatus::Failed );
        assert!( !p.state().is_playing );
        assert!( !p.state().is_loading );
        assert_eq!( current_id( &p ), Some( "a" ) );
        assert_eq!( p.queue().len(), 2 );

        // No retry, toggling does nothing
        assert!( p.toggle_play().is_none() );
        assert!( p.output().loads().is_empty() );

        // Skipping recovers
        let next = p.play_next().unwrap();
        assert_eq!( next.track.id, "b" );
        assert_eq!( p.state().error, None );
    }


    #[test]
    fn test_output_error_enters_failed_state() {
        let ( mut p, token ) = playing( &[ "a" ], "a" );

        p.handle_output_event( OutputEvent::new( token, OutputEventKind::Error( "decode".into() ) ) );

        assert_eq!( p.status(), PlayerStatus::Failed );
        assert_eq!( p.state().error.as_deref(), Some( "decode" ) );
        assert_eq!( p.output().last(), Some( &Call::Stop ) );
    }


    #[test]
    fn test_toggle_play() {
        let ( mut p, _ ) = playing( &[ "a" ], "a" );

        p.toggle_play();
        assert_eq!( p.status(), PlayerStatus::Paused );
        assert_eq!( p.output().last(), Some( &Call::Pause ) );

        p.toggle_play();
        assert_eq!( p.status(), PlayerStatus::Playing );
        assert_eq!( p.output().last(), Some( &Call::Play ) );
    }


    #[test]
    fn test_toggle_pair_restores_state() {
        let ( mut p, _ ) = playing( &[ "a", "b" ], "a" );
        let before = p.state().clone();

        p.toggle_play();
        p.toggle_play();

        assert_eq!( p.state(), &before );
    }


    #[test]
    fn test_toggle_without_track_is_noop() {
        let mut p = player();
        assert!( p.toggle_play().is_none() );
        assert_eq!( p.status(), PlayerStatus::Empty );
        assert!( !p.state().is_playing );
    }


    #[test]
    fn test_pause_while_resolving_is_applied_on_load() {
        let mut p = player();
        let req = p.play( track( "a" ), tracks( &[ "a" ] ) );

        p.toggle_play();
        assert!( !p.output().calls.contains( &Call::Pause ) );

        p.complete_load( req.token, Ok( "https://cdn/a.mp3".into() ) );
        assert!( matches!( p.output().last(), Some( Call::Load( .. ) ) ) );
        assert!( !p.output().calls.contains( &Call::Play ) );
    }


    #[test]
    fn test_seek_while_resolving_is_applied_on_load() {
        let mut p = player();
        let req = p.play( track( "a" ), tracks( &[ "a" ] ) );

        p.seek_to( 30.0 );
        assert!( !p.output().calls.iter().any( |c| matches!( c, Call::Seek( _ ) ) ) );
        assert_eq!( p.state().position_secs, 30.0 );

        p.complete_load( req.token, Ok( "https://cdn/a.mp3".into() ) );
        let calls = &p.output().calls;
        let load_at = calls.iter().position( |c| matches!( c, Call::Load( .. ) ) ).unwrap();
        let seek_at = calls.iter().position( |c| *c == Call::Seek( 30.0 ) ).unwrap();
        assert!( load_at < seek_at );
        assert_eq!( p.output().last(), Some( &Call::Play ) );
    }


    #[test]
    fn test_load_without_pending_seek_does_not_seek() {
        let mut p = player();
        let req = p.play( track( "a" ), tracks( &[ "a" ] ) );

        p.complete_load( req.token, Ok( "https://cdn/a.mp3".into() ) );
        assert!( !p.output().calls.iter().any( |c| matches!( c, Call::Seek( _ ) ) ) );
    }


    #[test]
    fn test_next_and_previous_wrap() {
        let ( mut p, _ ) = playing( &[ "a", "b", "c" ], "c" );

        assert_eq!( p.play_next().map( |r| r.track.id ), Some( "a".into() ) );
        assert_eq!( p.play_previous().map( |r| r.track.id ), Some( "c".into() ) );
        assert_eq!( p.play_previous().map( |r| r.track.id ), Some( "b".into() ) );
    }


    #[test]
    fn test_skip_on_empty_queue_is_noop() {
        let mut p = player();
        assert!( p.play_next().is_none() );
        assert!( p.play_previous().is_none() );
        assert_eq!( p.status(), PlayerStatus::Empty );
    }


    #[test]
    fn test_skip_when_current_track_not_queued() {
        let mut p = player();
        p.play( track( "x" ), tracks( &[ "a", "b", "c" ] ) );

        assert_eq!( p.queue().current_index(), None );
        assert_eq!( p.play_next().map( |r| r.track.id ), Some( "a".into() ) );

        p.play( track( "x" ), Vec::new() );
        assert_eq!( p.play_previous().map( |r| r.track.id ), Some( "c".into() ) );
    }


    #[test]
    fn test_next_then_previous_returns_to_start() {
        for len in 1..=4 {
            let ids: Vec<String> = ( 0..len ).map( |i| format!( "t{}", i ) ).collect();
            let refs: Vec<&str> = ids.iter().map( String::as_str ).collect();

            for start in &refs {
                let ( mut p, _ ) = playing( &refs, start );
                p.play_next();
                p.play_previous();
                assert_eq!( current_id( &p ), Some( *start ) );
            }
        }
    }


    #[test]
    fn test_ended_advances_queue() {
        let ( mut p, token ) = playing( &[ "a", "b", "c" ], "c" );

        let next = p.handle_output_event( OutputEvent::new( token, OutputEventKind::Ended ) );

        assert_eq!( next.map( |r| r.track.id ), Some( "a".into() ) );
        assert_eq!( p.status(), PlayerStatus::Loading );
    }


    #[test]
    fn test_single_track_replays_on_end() {
        let ( mut p, token ) = playing( &[ "a" ], "a" );

        let next = p.handle_output_event( OutputEvent::new( token, OutputEventKind::Ended ) ).unwrap();

        assert_eq!( next.track.id, "a" );
        assert_ne!( next.token, token );
        assert!( p.state().is_playing );
        assert_eq!( p.state().position_secs, 0.0 );
    }


    #[test]
    fn test_resume_after_end_restarts_track() {
        let mut p = player();
        let req = p.play( track( "solo" ), Vec::new() );
        p.complete_load( req.token, Ok( "https://cdn/solo.mp3".into() ) );

        assert!( p.handle_output_event( OutputEvent::new( req.token, OutputEventKind::Ended ) ).is_none() );
        assert_eq!( p.status(), PlayerStatus::Paused );

        let again = p.toggle_play().unwrap();
        assert_eq!( again.track.id, "solo" );
        assert_eq!( p.status(), PlayerStatus::Loading );
    }


    #[test]
    fn test_seek_clamps_to_duration() {
        let ( mut p, _ ) = playing( &[ "a" ], "a" );

        p.seek_to( 500.0 );
        assert_eq!( p.state().position_secs, 200.0 );
        assert_eq!( p.output().last(), Some( &Call::Seek( 200.0 ) ) );

        p.seek_to( -3.0 );
        assert_eq!( p.state().position_secs, 0.0 );

        p.seek_to( 42.5 );
        assert_eq!( p.state().position_secs, 42.5 );
    }


    #[test]
    fn test_seek_without_track_is_noop() {
        let mut p = player();
        p.seek_to( 10.0 );
        assert_eq!( p.state().position_secs, 0.0 );
        assert!( !p.output().calls.iter().any( |c| matches!( c, Call::Seek( _ ) ) ) );
    }


    #[test]
    fn test_time_update_is_clamped() {
        let ( mut p, token ) = playing( &[ "a" ], "a" );

        p.handle_output_event( OutputEvent::new( token, OutputEventKind::TimeUpdate( 12.0 ) ) );
        assert_eq!( p.state().position_secs, 12.0 );

        p.handle_output_event( OutputEvent::new( token, OutputEventKind::TimeUpdate( 999.0 ) ) );
        assert_eq!( p.state().position_secs, 200.0 );
    }


    #[test]
    fn test_volume_is_clamped_and_forwarded() {
        let mut p = player();

        p.set_volume( 1.7 );
        assert_eq!( p.state().volume, 1.0 );
        assert_eq!( p.output().last(), Some( &Call::Volume( 1.0 ) ) );

        p.set_volume( -0.2 );
        assert_eq!( p.state().volume, 0.0 );

        p.set_volume( f32::NAN );
        assert_eq!( p.state().volume, 0.0 );
    }


    #[test]
    fn test_volume_survives_stop() {
        let ( mut p, _ ) = playing( &[ "a" ], "a" );
        p.set_volume( 0.3 );
        p.stop();

        assert_eq!( p.status(), PlayerStatus::Empty );
        assert_eq!( p.state().volume, 0.3 );
    }


    #[test]
    fn test_clear_queue_stops_playback() {
        let ( mut p, token ) = playing( &[ "a", "b" ], "a" );

        p.clear_queue();

        assert_eq!( p.status(), PlayerStatus::Empty );
        assert!( p.queue().is_empty() );
        assert_eq!( p.current_token(), None );
        assert!( p.handle_output_event( OutputEvent::new( token, OutputEventKind::Ended ) ).is_none() );
    }


    #[test]
    fn test_moving_tracks_keeps_next_in_order() {
        let ( mut p, _ ) = playing( &[ "a", "b", "c" ], "a" );

        assert!( p.move_in_queue( 2, 1 ) );
        assert!( !p.move_in_queue( 0, 3 ) );
        assert_eq!( p.status(), PlayerStatus::Playing );

        let ids: Vec<&str> = p.queue().tracks().iter().map( |t| t.id.as_str() ).collect();
        assert_eq!( ids, vec![ "a", "c", "b" ] );
        assert_eq!( p.play_next().map( |r| r.track.id ), Some( "c".into() ) );
    }


    #[test]
    fn test_moving_current_track_follows_it() {
        let ( mut p, _ ) = playing( &[ "a", "b", "c" ], "a" );

        assert!( p.move_in_queue( 0, 2 ) );
        assert_eq!( p.queue().current_index(), Some( 2 ) );
        assert_eq!( p.play_next().map( |r| r.track.id ), Some( "b".into() ) );
    }


    #[test]
    fn test_removing_last_queued_track_stops_playback() {
        let ( mut p, _ ) = playing( &[ "a", "b" ], "a" );

        assert_eq!( p.remove_from_queue( 1 ).map( |t| t.id ), Some( "b".into() ) );
        assert_eq!( p.status(), PlayerStatus::Playing );

        p.remove_from_queue( 0 );
        assert_eq!( p.status(), PlayerStatus::Empty );
        assert!( p.remove_from_queue( 0 ).is_none() );
    }


    #[test]
    fn test_add_to_queue() {
        let ( mut p, _ ) = playing( &[ "a" ], "a" );
        p.add_to_queue( track( "b" ) );

        assert_eq!( p.queue().len(), 2 );
        assert_eq!( p.play_next().map( |r| r.track.id ), Some( "b".into() ) );
    }
}
