//! Audio output adapter boundary
//!
//! The player talks to exactly one [`AudioOutput`]. Commands flow in through
//! the trait; progress flows back as [`OutputEvent`]s delivered to the
//! [`OutputListener`] the adapter was built with. Every event carries the
//! [`LoadToken`] of the load that produced it so superseded loads can be
//! recognized and dropped.

use std::fmt;
use std::sync::Arc;


/// Identifies one load request. Tokens increase monotonically.
#[derive( Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash )]
pub struct LoadToken( pub u64 );


impl fmt::Display for LoadToken {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "#{}", self.0 )
    }
}


/// What happened on the output.
#[derive( Debug, Clone, PartialEq )]
pub enum OutputEventKind {
    /// Playback position, in seconds.
    TimeUpdate( f64 ),

    /// Source opened; total duration in seconds (0 when unknown).
    MetadataReady( f64 ),

    /// Enough data is buffered to start.
    CanPlay,

    /// Source played to the end.
    Ended,

    /// Source could not be fetched, decoded or played.
    Error( String ),
}


/// An event reported by the output for a specific load.
#[derive( Debug, Clone, PartialEq )]
pub struct OutputEvent {
    pub token: LoadToken,
    pub kind: OutputEventKind,
}


impl OutputEvent {
    pub fn new( token: LoadToken, kind: OutputEventKind ) -> Self {
        Self { token, kind }
    }
}


/// Callback receiving output events. May be invoked from any thread.
pub type OutputListener = Arc<dyn Fn( OutputEvent ) + Send + Sync>;


/// A single audio output handle.
///
/// Implementations hold at most one source. `load` supersedes whatever was
/// loaded or loading before; `play` and `pause` are idempotent; volume applies
/// immediately regardless of transport state.
pub trait AudioOutput {
    /// Starts loading `url`. Events for this source are tagged with `token`.
    fn load( &mut self, token: LoadToken, url: &str );

    /// Starts or resumes playback of the loaded source.
    fn play( &mut self );

    /// Pauses playback.
    fn pause( &mut self );

    /// Jumps to a position in seconds.
    fn seek( &mut self, position_secs: f64 );

    /// Sets the volume, 0.0 to 1.0.
    fn set_volume( &mut self, volume: f32 );

    /// Drops the current source, if any.
    fn stop( &mut self );
}


impl<T: AudioOutput + ?Sized> AudioOutput for Box<T> {
    fn load( &mut self, token: LoadToken, url: &str ) {
        ( **self ).load( token, url )
    }


    fn play( &mut self ) {
        ( **self ).play()
    }


    fn pause( &mut self ) {
        ( **self ).pause()
    }


    fn seek( &mut self, position_secs: f64 ) {
        ( **self ).seek( position_secs )
    }


    fn set_volume( &mut self, volume: f32 ) {
        ( **self ).set_volume( volume )
    }


    fn stop( &mut self ) {
        ( **self ).stop()
    }
}


/// Output that accepts every command and never produces sound.
///
/// Built with a listener it reports every load as ready with an unknown
/// duration, so the player leaves Loading without a device.
#[derive( Default )]
pub struct NullOutput {
    listener: Option<OutputListener>,
    loaded: Option<( LoadToken, String )>,
    playing: bool,
    volume: f32,
}


impl fmt::Debug for NullOutput {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.debug_struct( "NullOutput" )
            .field( "reports", &self.listener.is_some() )
            .field( "loaded", &self.loaded )
            .field( "playing", &self.playing )
            .field( "volume", &self.volume )
            .finish()
    }
}


impl NullOutput {
    /// Creates an output that stays silent and reports nothing.
    pub fn new() -> Self {
        Self::default()
    }


    /// Creates an output that reports loads to `listener`.
    pub fn with_listener( listener: OutputListener ) -> Self {
        Self { listener: Some( listener ), ..Self::default() }
    }


    /// Token and URL of the current source.
    pub fn loaded( &self ) -> Option<( LoadToken, &str )> {
        self.loaded.as_ref().map( |( t, u )| ( *t, u.as_str() ) )
    }


    pub fn is_playing( &self ) -> bool {
        self.playing
    }


    pub fn volume( &self ) -> f32 {
        self.volume
    }
}


impl AudioOutput for NullOutput {
    fn load( &mut self, token: LoadToken, url: &str ) {
        self.loaded = Some(( token, url.to_string() ));
        self.playing = false;

        if let Some( listener ) = &self.listener {
            listener( OutputEvent::new( token, OutputEventKind::MetadataReady( 0.0 ) ) );
            listener( OutputEvent::new( token, OutputEventKind::CanPlay ) );
        }
    }


    fn play( &mut self ) {
        self.playing = self.loaded.is_some();
    }


    fn pause( &mut self ) {
        self.playing = false;
    }


    fn seek( &mut self, _position_secs: f64 ) {}


    fn set_volume( &mut self, volume: f32 ) {
        self.volume = volume;
    }


    fn stop( &mut self ) {
        self.loaded = None;
        self.playing = false;
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_null_output_tracks_transport() {
        let mut output = NullOutput::new();

        output.play();
        assert!( !output.is_playing() );

        output.load( LoadToken( 3 ), "file:///a.mp3" );
        output.play();
        output.play();
        assert!( output.is_playing() );
        assert_eq!( output.loaded(), Some(( LoadToken( 3 ), "file:///a.mp3" )) );

        output.stop();
        assert!( output.loaded().is_none() );
        assert!( !output.is_playing() );
    }


    #[test]
    fn test_null_output_reports_loads_to_listener() {
        let events = Arc::new( std::sync::Mutex::new( Vec::new() ) );
        let sink = Arc::clone( &events );
        let listener: OutputListener = Arc::new( move |event| sink.lock().unwrap().push( event ) );

        let mut output = NullOutput::with_listener( listener );
        output.load( LoadToken( 5 ), "https://cdn/a.mp3" );
        output.play();
        output.seek( 10.0 );

        assert_eq!( *events.lock().unwrap(), vec![
            OutputEvent::new( LoadToken( 5 ), OutputEventKind::MetadataReady( 0.0 ) ),
            OutputEvent::new( LoadToken( 5 ), OutputEventKind::CanPlay ),
        ]);
        assert!( output.is_playing() );
    }


    #[test]
    fn test_tokens_order_by_sequence() {
        assert!( LoadToken( 1 ) < LoadToken( 2 ) );
        assert_eq!( LoadToken( 7 ).to_string(), "#7" );
    }
}
