//! Audio decoding via Symphonia
//!
//! Decodes a fully fetched source held in memory into interleaved f32 PCM.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{ Decoder as SymphoniaDecoder, DecoderOptions, CODEC_TYPE_NULL };
use symphonia::core::formats::{ FormatOptions, FormatReader, SeekMode, SeekTo };
use symphonia::core::io::{ MediaSourceStream, MediaSourceStreamOptions };
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;
use thiserror::Error;


/// Errors that can occur during decoding.
#[derive( Debug, Error )]
pub enum DecoderError {
    #[error( "Unsupported format" )]
    UnsupportedFormat,

    #[error( "No audio tracks found" )]
    NoAudioTrack,

    #[error( "Decoder creation failed: {0}" )]
    DecoderCreation( String ),

    #[error( "Decode error: {0}" )]
    Decode( String ),

    #[error( "Seek error: {0}" )]
    Seek( String ),
}


/// Audio decoder wrapper around Symphonia.
pub struct Decoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn SymphoniaDecoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    sample_buf: Option<SampleBuffer<f32>>,
    duration: Option<f64>,
}


impl Decoder {
    /// Opens encoded audio held in memory.
    ///
    /// @param bytes - The complete encoded source
    /// @param extension - File extension hint ("mp3", "m4a", ...), if known
    pub fn from_bytes( bytes: Vec<u8>, extension: Option<&str> ) -> Result<Self, DecoderError> {
        let mss = MediaSourceStream::new(
            Box::new( Cursor::new( bytes ) ),
            MediaSourceStreamOptions::default(),
        );

        let mut hint = Hint::new();
        if let Some( ext ) = extension {
            hint.with_extension( ext );
        }

        let probed = symphonia::default::get_probe()
            .format( &hint, mss, &FormatOptions::default(), &MetadataOptions::default() )
            .map_err( |_| DecoderError::UnsupportedFormat )?;

        let format_reader = probed.format;

        // Find the first audio track
        let track = format_reader
            .tracks()
            .iter()
            .find( |t| t.codec_params.codec != CODEC_TYPE_NULL )
            .ok_or( DecoderError::NoAudioTrack )?;

        let track_id = track.id;
        let codec_params = &track.codec_params;

        let sample_rate = codec_params.sample_rate.unwrap_or( 44100 );
        let channels = codec_params.channels.map( |c| c.count() ).unwrap_or( 2 );

        let duration = codec_params.n_frames.map( |frames| {
            frames as f64 / sample_rate as f64
        });

        tracing::info!(
            "Opened audio: {} Hz, {} channels, duration: {:?}s",
            sample_rate,
            channels,
            duration
        );

        let decoder = symphonia::default::get_codecs()
            .make( codec_params, &DecoderOptions::default() )
            .map_err( |e| DecoderError::DecoderCreation( e.to_string() ) )?;

        Ok( Self {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            sample_buf: None,
            duration,
        })
    }


    /// Returns the sample rate of the audio.
    pub fn sample_rate( &self ) -> u32 {
        self.sample_rate
    }


    /// Returns the number of channels.
    pub fn channels( &self ) -> usize {
        self.channels
    }


    /// Returns the duration in seconds, if known.
    pub fn duration( &self ) -> Option<f64> {
        self.duration
    }


    /// Decodes the next packet and returns interleaved f32 samples.
    ///
    /// Returns None when EOF is reached.
    pub fn decode_next( &mut self ) -> Result<Option<Vec<f32>>, DecoderError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok( packet ) => packet,
                Err( symphonia::core::errors::Error::IoError( ref e ) )
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok( None );
                }
                Err( e ) => {
                    return Err( DecoderError::Decode( e.to_string() ) );
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode( &packet ) {
                Ok( decoded ) => decoded,
                Err( symphonia::core::errors::Error::DecodeError( _ ) ) => {
                    // Corrupt packet, skip it
                    continue;
                }
                Err( e ) => {
                    return Err( DecoderError::Decode( e.to_string() ) );
                }
            };

            let spec = *decoded.spec();
            let num_frames = decoded.frames();

            let needs_buffer = self.sample_buf
                .as_ref()
                .map_or( true, |buf| buf.capacity() < num_frames );
            if needs_buffer {
                self.sample_buf = Some( SampleBuffer::new( num_frames as u64, spec ) );
            }

            if let Some( sample_buf ) = self.sample_buf.as_mut() {
                sample_buf.copy_interleaved_ref( decoded );
                return Ok( Some( sample_buf.samples().to_vec() ) );
            }
        }
    }


    /// Seeks to a position in seconds.
    pub fn seek( &mut self, position_secs: f64 ) -> Result<(), DecoderError> {
        let seek_to = SeekTo::Time {
            time: Time::from( position_secs ),
            track_id: Some( self.track_id ),
        };

        self.format_reader
            .seek( SeekMode::Accurate, seek_to )
            .map_err( |e| DecoderError::Seek( e.to_string() ) )?;

        self.decoder.reset();

        Ok(())
    }
}


/// Guesses a format hint from the path component of a URL or file path.
pub fn extension_hint( location: &str ) -> Option<&str> {
    let path = location.split( [ '?', '#' ] ).next().unwrap_or( location );
    let name = path.rsplit( '/' ).next()?;
    let ( stem, ext ) = name.rsplit_once( '.' )?;
    ( !stem.is_empty() && !ext.is_empty() && ext.len() <= 5 ).then_some( ext )
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_extension_hint() {
        assert_eq!( extension_hint( "https://cdn.example/a/b/song.mp4?token=1" ), Some( "mp4" ) );
        assert_eq!( extension_hint( "/music/track.flac" ), Some( "flac" ) );
        assert_eq!( extension_hint( "https://cdn.example/stream" ), None );
        assert_eq!( extension_hint( "https://cdn.example/.hidden" ), None );
    }


    #[test]
    fn test_garbage_is_unsupported() {
        let result = Decoder::from_bytes( b"definitely not audio".to_vec(), None );
        assert!( matches!( result, Err( DecoderError::UnsupportedFormat ) ) );
    }
}
