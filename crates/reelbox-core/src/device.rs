//! Device-backed audio output
//!
//! [`DeviceOutput`] implements [`AudioOutput`] on the system audio device.
//! Each load runs on its own worker thread: fetch the source, decode it with
//! Symphonia, resample when the device rate differs, and feed a cpal stream
//! that lives and dies on that thread. The output handle itself only holds
//! shared flags, so it is `Send` and can sit inside the session.

use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{ AtomicBool, AtomicU32, Ordering };
use std::sync::{ Arc, Mutex, PoisonError };
use std::thread;
use std::time::Duration;

use cpal::traits::{ DeviceTrait, HostTrait, StreamTrait };
use rubato::{ FastFixedOut, PolynomialDegree, Resampler };
use thiserror::Error;

use crate::decoder::{ extension_hint, Decoder, DecoderError };
use crate::output::{ AudioOutput, LoadToken, OutputEvent, OutputEventKind, OutputListener };


/// Minimum spacing between position reports, in seconds.
const TIME_UPDATE_INTERVAL: f64 = 0.25;


/// Errors that can occur while playing a source on the device.
#[derive( Debug, Error )]
pub enum DeviceError {
    #[error( "Failed to fetch source: {0}" )]
    Fetch( String ),

    #[error( transparent )]
    Decode( #[from] DecoderError ),

    #[error( "No output device available" )]
    NoDevice,

    #[error( "Failed to get stream config: {0}" )]
    StreamConfig( String ),

    #[error( "Failed to build output stream: {0}" )]
    BuildStream( String ),

    #[error( "Failed to play stream: {0}" )]
    PlayStream( String ),

    #[error( "Failed to create resampler: {0}" )]
    Resampler( String ),
}


/// Converts planar samples back to interleaved format.
/// [[L0, L1, ...], [R0, R1, ...]] → [L0, R0, L1, R1, ...]
fn interleave( channels: &[Vec<f32>] ) -> Vec<f32> {
    if channels.is_empty() || channels[ 0 ].is_empty() {
        return Vec::new();
    }
    let frames = channels[ 0 ].len();
    let mut out = Vec::with_capacity( frames * channels.len() );
    for f in 0..frames {
        for ch in channels {
            out.push( ch[ f ] );
        }
    }
    out
}


/// Sample queue between the decode loop and the device callback.
/// Handles channel conversion between source and output.
struct SampleBuffer {
    buffer: Mutex<VecDeque<f32>>,
    capacity: usize,
    /// Volume stored as f32 bits, shared with the owning `DeviceOutput`
    volume: Arc<AtomicU32>,
    source_channels: usize,
    output_channels: usize,
}


impl SampleBuffer {
    fn new( capacity: usize, source_channels: usize, output_channels: usize, volume: Arc<AtomicU32> ) -> Self {
        Self {
            buffer: Mutex::new( VecDeque::with_capacity( capacity ) ),
            capacity,
            volume,
            source_channels: source_channels.max( 1 ),
            output_channels: output_channels.max( 1 ),
        }
    }


    fn lock( &self ) -> std::sync::MutexGuard<'_, VecDeque<f32>> {
        self.buffer.lock().unwrap_or_else( PoisonError::into_inner )
    }


    /// Pushes samples to the buffer. Returns number of samples actually pushed.
    fn push( &self, samples: &[f32] ) -> usize {
        let mut buf = self.lock();
        let available = self.capacity.saturating_sub( buf.len() );
        let to_push = samples.len().min( available );
        buf.extend( samples[ ..to_push ].iter().copied() );
        to_push
    }


    /// Fills `output` with device frames, padding with silence.
    fn pop( &self, output: &mut [f32] ) {
        let volume = f32::from_bits( self.volume.load( Ordering::Relaxed ) );
        let mut buf = self.lock();
        let src_ch = self.source_channels;
        let out_ch = self.output_channels;

        let output_frames = output.len() / out_ch;
        let frames = output_frames.min( buf.len() / src_ch );

        for frame in 0..frames {
            let source: Vec<f32> = buf.drain( ..src_ch ).collect();
            let out = &mut output[ frame * out_ch..( frame + 1 ) * out_ch ];

            if src_ch == 2 && out_ch == 1 {
                // Stereo to mono: mix down
                out[ 0 ] = ( source[ 0 ] + source[ 1 ] ) * 0.5 * volume;
            } else {
                // Extra device channels repeat the last source channel
                for ( ch, sample ) in out.iter_mut().enumerate() {
                    *sample = source[ ch.min( src_ch - 1 ) ] * volume;
                }
            }
        }

        for sample in output[ frames * out_ch.. ].iter_mut() {
            *sample = 0.0;
        }
    }


    fn len( &self ) -> usize {
        self.lock().len()
    }


    fn is_empty( &self ) -> bool {
        self.lock().is_empty()
    }


    fn clear( &self ) {
        self.lock().clear();
    }
}


/// Flags shared between a `DeviceOutput` and one worker.
#[derive( Debug )]
struct Control {
    stop: AtomicBool,
    paused: AtomicBool,
    seek_request: Mutex<Option<f64>>,
}


impl Control {
    fn new() -> Self {
        Self {
            stop: AtomicBool::new( false ),
            paused: AtomicBool::new( true ),
            seek_request: Mutex::new( None ),
        }
    }


    fn stopped( &self ) -> bool {
        self.stop.load( Ordering::Relaxed )
    }


    fn paused( &self ) -> bool {
        self.paused.load( Ordering::Relaxed )
    }


    fn request_seek( &self, position_secs: f64 ) {
        *self.seek_request.lock().unwrap_or_else( PoisonError::into_inner ) = Some( position_secs );
    }


    fn seek_pending( &self ) -> bool {
        self.seek_request.lock().unwrap_or_else( PoisonError::into_inner ).is_some()
    }


    fn take_seek( &self ) -> Option<f64> {
        self.seek_request.lock().unwrap_or_else( PoisonError::into_inner ).take()
    }
}


/// The load currently owned by the output.
struct Playback {
    token: LoadToken,
    control: Arc<Control>,
}


/// Audio output on the default system device.
pub struct DeviceOutput {
    listener: OutputListener,
    volume: Arc<AtomicU32>,
    current: Option<Playback>,
}


impl DeviceOutput {
    /// Creates the output. Nothing touches the device until the first load.
    pub fn new( listener: OutputListener ) -> Self {
        Self {
            listener,
            volume: Arc::new( AtomicU32::new( 1.0_f32.to_bits() ) ),
            current: None,
        }
    }


    /// Token of the current load, if any.
    pub fn current_token( &self ) -> Option<LoadToken> {
        self.current.as_ref().map( |p| p.token )
    }


    fn release( &mut self ) {
        if let Some( playback ) = self.current.take() {
            // The worker notices on its next iteration and drops its stream
            playback.control.stop.store( true, Ordering::Relaxed );
            tracing::debug!( "Released load {}", playback.token );
        }
    }
}


impl AudioOutput for DeviceOutput {
    fn load( &mut self, token: LoadToken, url: &str ) {
        self.release();

        let control = Arc::new( Control::new() );
        let worker = Worker {
            token,
            location: url.to_string(),
            control: Arc::clone( &control ),
            volume: Arc::clone( &self.volume ),
            listener: Arc::clone( &self.listener ),
        };

        let spawned = thread::Builder::new()
            .name( format!( "reelbox-playback-{}", token.0 ) )
            .spawn( move || worker.run() );

        match spawned {
            Ok( _ ) => {
                tracing::info!( "Loading {} {}", token, url );
                self.current = Some( Playback { token, control } );
            }
            Err( e ) => {
                tracing::error!( "Failed to spawn playback thread: {}", e );
                ( self.listener )( OutputEvent::new( token, OutputEventKind::Error( e.to_string() ) ) );
            }
        }
    }


    fn play( &mut self ) {
        if let Some( ref playback ) = self.current {
            playback.control.paused.store( false, Ordering::Relaxed );
        }
    }


    fn pause( &mut self ) {
        if let Some( ref playback ) = self.current {
            playback.control.paused.store( true, Ordering::Relaxed );
        }
    }


    fn seek( &mut self, position_secs: f64 ) {
        if let Some( ref playback ) = self.current {
            playback.control.request_seek( position_secs.max( 0.0 ) );
        }
    }


    fn set_volume( &mut self, volume: f32 ) {
        self.volume.store( volume.clamp( 0.0, 1.0 ).to_bits(), Ordering::Relaxed );
    }


    fn stop( &mut self ) {
        self.release();
    }
}


impl Drop for DeviceOutput {
    fn drop( &mut self ) {
        self.release();
    }
}


/// Everything one playback thread needs.
struct Worker {
    token: LoadToken,
    location: String,
    control: Arc<Control>,
    volume: Arc<AtomicU32>,
    listener: OutputListener,
}


impl Worker {
    fn run( self ) {
        match self.play_source() {
            Ok(()) => tracing::debug!( "Playback thread {} exiting", self.token ),
            Err( e ) => {
                tracing::error!( "Playback {} failed: {}", self.token, e );
                self.emit( OutputEventKind::Error( e.to_string() ) );
            }
        }
    }


    fn emit( &self, kind: OutputEventKind ) {
        if !self.control.stopped() {
            ( self.listener )( OutputEvent::new( self.token, kind ) );
        }
    }


    fn fetch( &self ) -> Result<Vec<u8>, DeviceError> {
        let location = self.location.as_str();

        if location.starts_with( "http://" ) || location.starts_with( "https://" ) {
            let response = reqwest::blocking::Client::new()
                .get( location )
                .send()
                .and_then( |r| r.error_for_status() )
                .map_err( |e| DeviceError::Fetch( e.to_string() ) )?;
            let bytes = response.bytes().map_err( |e| DeviceError::Fetch( e.to_string() ) )?;
            Ok( bytes.to_vec() )
        } else {
            let path = location.strip_prefix( "file://" ).unwrap_or( location );
            fs::read( path ).map_err( |e| DeviceError::Fetch( format!( "{}: {}", path, e ) ) )
        }
    }


    fn play_source( &self ) -> Result<(), DeviceError> {
        let bytes = self.fetch()?;
        if self.control.stopped() {
            return Ok(());
        }

        let mut decoder = Decoder::from_bytes( bytes, extension_hint( &self.location ) )?;
        let source_rate = decoder.sample_rate();
        let channels = decoder.channels();

        self.emit( OutputEventKind::MetadataReady( decoder.duration().unwrap_or( 0.0 ) ) );

        let ( stream, device_rate, sample_buffer ) = open_stream(
            source_rate,
            channels,
            Arc::clone( &self.control ),
            Arc::clone( &self.volume ),
        )?;
        stream.play().map_err( |e| DeviceError::PlayStream( e.to_string() ) )?;

        self.emit( OutputEventKind::CanPlay );

        let mut resampler = make_resampler( source_rate, device_rate, channels )?;
        let mut pending: Vec<Vec<f32>> = ( 0..channels ).map( |_| Vec::new() ).collect();

        // Don't decode too far ahead - keep about 50ms buffered
        let target_buffer = ( source_rate as usize * channels ) / 20;

        let mut frames_decoded: u64 = 0;
        let mut last_report = 0.0_f64;
        let mut at_eof = false;

        loop {
            if self.control.stopped() {
                tracing::debug!( "Decode loop: stop signal received" );
                return Ok(());
            }

            if let Some( target ) = self.control.take_seek() {
                match decoder.seek( target ) {
                    Ok(()) => {
                        sample_buffer.clear();
                        pending.iter_mut().for_each( Vec::clear );
                        resampler = make_resampler( source_rate, device_rate, channels )?;
                        frames_decoded = ( target * source_rate as f64 ) as u64;
                        last_report = target;
                        at_eof = false;
                        self.emit( OutputEventKind::TimeUpdate( target ) );
                    }
                    Err( e ) => tracing::warn!( "Seek to {:.1}s failed: {}", target, e ),
                }
                continue;
            }

            if self.control.paused() {
                thread::sleep( Duration::from_millis( 10 ) );
                continue;
            }

            if at_eof {
                if sample_buffer.is_empty() {
                    tracing::info!( "Decode loop: reached end of source" );
                    self.emit( OutputEventKind::Ended );
                    return Ok(());
                }
                thread::sleep( Duration::from_millis( 10 ) );
                continue;
            }

            if sample_buffer.len() > target_buffer {
                thread::sleep( Duration::from_millis( 5 ) );
                continue;
            }

            match decoder.decode_next()? {
                Some( samples ) => {
                    frames_decoded += ( samples.len() / channels ) as u64;
                    let output = match resampler.as_mut() {
                        Some( resampler ) => resample( resampler, &mut pending, &samples ),
                        None => samples,
                    };
                    self.push_all( &sample_buffer, &output );
                }
                None => {
                    if let Some( resampler ) = resampler.as_mut() {
                        if !pending[ 0 ].is_empty() {
                            match resampler.process_partial( Some( &pending ), None ) {
                                Ok( resampled ) => self.push_all( &sample_buffer, &interleave( &resampled ) ),
                                Err( e ) => tracing::error!( "Final resample error: {}", e ),
                            }
                            pending.iter_mut().for_each( Vec::clear );
                        }
                    }
                    at_eof = true;
                }
            }

            let position = frames_decoded as f64 / source_rate as f64;
            if ( position - last_report ).abs() >= TIME_UPDATE_INTERVAL {
                last_report = position;
                self.emit( OutputEventKind::TimeUpdate( position ) );
            }
        }
    }


    /// Pushes samples, waiting for room. Gives up early on stop or seek.
    fn push_all( &self, buffer: &SampleBuffer, samples: &[f32] ) {
        let mut offset = 0;
        while offset < samples.len() && !self.control.stopped() && !self.control.seek_pending() {
            let pushed = buffer.push( &samples[ offset.. ] );
            offset += pushed;
            if pushed == 0 {
                thread::sleep( Duration::from_millis( 5 ) );
            }
        }
    }
}


/// Runs interleaved samples through the resampler, keeping leftovers in `pending`.
fn resample( resampler: &mut FastFixedOut<f32>, pending: &mut [Vec<f32>], samples: &[f32] ) -> Vec<f32> {
    let channels = pending.len();
    for chunk in samples.chunks( channels ) {
        for ( ch_idx, sample ) in chunk.iter().enumerate() {
            pending[ ch_idx ].push( *sample );
        }
    }

    let mut output = Vec::new();
    while pending[ 0 ].len() >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let input_chunk: Vec<Vec<f32>> = pending
            .iter_mut()
            .map( |ch| ch.drain( ..needed ).collect() )
            .collect();

        match resampler.process( &input_chunk, None ) {
            Ok( resampled ) => output.extend( interleave( &resampled ) ),
            Err( e ) => {
                tracing::error!( "Resample error: {}", e );
                break;
            }
        }
    }
    output
}


/// Builds a resampler when the source and device rates differ.
fn make_resampler(
    source_rate: u32,
    device_rate: u32,
    channels: usize,
) -> Result<Option<FastFixedOut<f32>>, DeviceError> {
    if source_rate == device_rate {
        return Ok( None );
    }

    tracing::info!( "Resampling: {} Hz → {} Hz", source_rate, device_rate );

    FastFixedOut::<f32>::new(
        device_rate as f64 / source_rate as f64,
        2.0,  // max relative input/output size ratio
        PolynomialDegree::Cubic,
        1024, // output chunk size
        channels,
    )
    .map( Some )
    .map_err( |e| DeviceError::Resampler( e.to_string() ) )
}


/// Opens a stream on the default device.
///
/// Returns the stream, the rate the device runs at, and the buffer that feeds it.
fn open_stream(
    source_rate: u32,
    source_channels: usize,
    control: Arc<Control>,
    volume: Arc<AtomicU32>,
) -> Result<( cpal::Stream, u32, Arc<SampleBuffer> ), DeviceError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or( DeviceError::NoDevice )?;

    tracing::info!( "Using output device: {:?}", device.name() );

    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err( |e| DeviceError::StreamConfig( e.to_string() ) )?
        .collect();

    fn supports_rate( c: &cpal::SupportedStreamConfigRange, rate: u32 ) -> bool {
        c.min_sample_rate().0 <= rate && c.max_sample_rate().0 >= rate
    }

    // Priority: exact match, then same rate with any channel count, then device default
    let config = if let Some( supported ) = supported_configs.iter().find( |c| {
        c.channels() as usize == source_channels && supports_rate( c, source_rate )
    }) {
        supported.clone().with_sample_rate( cpal::SampleRate( source_rate ) ).config()
    } else if let Some( supported ) = supported_configs.iter().find( |c| supports_rate( c, source_rate ) ) {
        tracing::info!(
            "Channel conversion: source has {} channels, device using {}",
            source_channels,
            supported.channels()
        );
        supported.clone().with_sample_rate( cpal::SampleRate( source_rate ) ).config()
    } else {
        device
            .default_output_config()
            .map_err( |e| DeviceError::StreamConfig( e.to_string() ) )?
            .config()
    };

    tracing::info!(
        "Audio output config: {} Hz, {} channels",
        config.sample_rate.0,
        config.channels
    );

    // Buffer size: ~500ms of audio
    let capacity = ( config.sample_rate.0 as usize ) * source_channels / 2;
    let sample_buffer = Arc::new( SampleBuffer::new(
        capacity,
        source_channels,
        config.channels as usize,
        volume,
    ));
    let callback_buffer = Arc::clone( &sample_buffer );

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if control.paused() {
                    data.fill( 0.0 );
                } else {
                    callback_buffer.pop( data );
                }
            },
            |err| {
                tracing::error!( "Audio output error: {}", err );
            },
            None,
        )
        .map_err( |e| DeviceError::BuildStream( e.to_string() ) )?;

    Ok(( stream, config.sample_rate.0, sample_buffer ))
}


#[cfg( test )]
mod tests {
    use super::*;


    fn buffer( capacity: usize, src: usize, out: usize, volume: f32 ) -> SampleBuffer {
        SampleBuffer::new( capacity, src, out, Arc::new( AtomicU32::new( volume.to_bits() ) ) )
    }


    #[test]
    fn test_interleave() {
        let planar = vec![ vec![ 1.0, 2.0 ], vec![ 10.0, 20.0 ] ];
        assert_eq!( interleave( &planar ), vec![ 1.0, 10.0, 2.0, 20.0 ] );
        assert!( interleave( &[] ).is_empty() );
    }


    #[test]
    fn test_push_respects_capacity() {
        let buf = buffer( 4, 2, 2, 1.0 );
        assert_eq!( buf.push( &[ 0.1; 6 ] ), 4 );
        assert_eq!( buf.len(), 4 );
        buf.clear();
        assert!( buf.is_empty() );
    }


    #[test]
    fn test_pop_mono_to_stereo_applies_volume() {
        let buf = buffer( 16, 1, 2, 0.5 );
        buf.push( &[ 1.0, -1.0 ] );

        let mut out = [ 9.0_f32; 6 ];
        buf.pop( &mut out );

        assert_eq!( out, [ 0.5, 0.5, -0.5, -0.5, 0.0, 0.0 ] );
    }


    #[test]
    fn test_pop_stereo_to_mono_mixes_down() {
        let buf = buffer( 16, 2, 1, 1.0 );
        buf.push( &[ 1.0, 0.0, 0.5, 0.5 ] );

        let mut out = [ 9.0_f32; 3 ];
        buf.pop( &mut out );

        assert_eq!( out, [ 0.5, 0.5, 0.0 ] );
    }


    #[test]
    fn test_seek_requests_coalesce() {
        let control = Control::new();
        assert!( control.paused() );

        control.request_seek( 10.0 );
        control.request_seek( 42.0 );

        assert!( control.seek_pending() );
        assert_eq!( control.take_seek(), Some( 42.0 ) );
        assert!( !control.seek_pending() );
    }


    #[test]
    fn test_missing_local_file_reports_error_event() {
        let events = Arc::new( Mutex::new( Vec::new() ) );
        let sink = Arc::clone( &events );
        let listener: OutputListener = Arc::new( move |e| sink.lock().unwrap().push( e ) );

        let mut output = DeviceOutput::new( listener );
        output.load( LoadToken( 1 ), "/definitely/not/here.mp3" );

        let mut received = Vec::new();
        for _ in 0..200 {
            received = events.lock().unwrap().clone();
            if !received.is_empty() {
                break;
            }
            thread::sleep( Duration::from_millis( 10 ) );
        }

        assert_eq!( received.len(), 1 );
        assert_eq!( received[ 0 ].token, LoadToken( 1 ) );
        assert!( matches!( received[ 0 ].kind, OutputEventKind::Error( _ ) ) );
    }
}
