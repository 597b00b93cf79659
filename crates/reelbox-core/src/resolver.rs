//! Stream URL resolution
//!
//! Turns a [`Track`] into a URL the output can load. Music API records carry
//! token endpoints that answer with a short-lived `auth_url`; some carry
//! direct media links; most also have a preview clip to fall back on.

use std::future::Future;

use serde::Deserialize;
use thiserror::Error;

use crate::decoder::extension_hint;
use crate::track::Track;


/// Extensions treated as directly playable media rather than token endpoints.
const MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "mp4", "m4a", "aac", "ogg", "oga", "opus", "flac", "wav",
];


/// Errors that can occur while resolving a stream.
#[derive( Debug, Clone, PartialEq, Error )]
pub enum ResolveError {
    #[error( "Track {0} has no stream source" )]
    NoSource( String ),

    #[error( "Request failed: {0}" )]
    Http( String ),

    #[error( "Unexpected response: {0}" )]
    InvalidResponse( String ),
}


/// Resolves tracks to playable URLs.
pub trait StreamResolver: Send + Sync + 'static {
    fn resolve( &self, track: &Track ) -> impl Future<Output = Result<String, ResolveError>> + Send;
}


#[derive( Debug, Deserialize )]
struct AuthResponse {
    #[serde( default )]
    auth_url: Option<String>,
}


/// Resolver backed by the music API's token endpoints.
#[derive( Debug, Clone, Default )]
pub struct HttpResolver {
    client: reqwest::Client,
}


impl HttpResolver {
    pub fn new() -> Self {
        Self::default()
    }


    pub fn with_client( client: reqwest::Client ) -> Self {
        Self { client }
    }


    async fn fetch_auth_url( &self, token_url: &str ) -> Result<String, ResolveError> {
        let response = self.client
            .get( token_url )
            .send()
            .await
            .and_then( |r| r.error_for_status() )
            .map_err( |e| ResolveError::Http( e.to_string() ) )?;

        let body: AuthResponse = response
            .json()
            .await
            .map_err( |e| ResolveError::InvalidResponse( e.to_string() ) )?;

        body.auth_url
            .filter( |u| !u.is_empty() )
            .ok_or_else( || ResolveError::InvalidResponse( "missing auth_url".into() ) )
    }
}


impl StreamResolver for HttpResolver {
    async fn resolve( &self, track: &Track ) -> Result<String, ResolveError> {
        if let Some( url ) = &track.stream_url {
            return Ok( url.clone() );
        }

        let mut last_error = None;
        for candidate in &track.download_urls {
            if is_media_url( candidate ) {
                return Ok( candidate.clone() );
            }

            match self.fetch_auth_url( candidate ).await {
                Ok( url ) => return Ok( url ),
                Err( e ) => {
                    tracing::warn!( "Token endpoint failed for {}: {}", track.id, e );
                    last_error = Some( e );
                }
            }
        }

        if let Some( preview ) = &track.preview_url {
            tracing::info!( "Falling back to preview clip for {}", track.id );
            return Ok( preview.clone() );
        }

        Err( last_error.unwrap_or_else( || ResolveError::NoSource( track.id.clone() ) ) )
    }
}


/// Returns true if the URL points straight at an audio file.
pub fn is_media_url( url: &str ) -> bool {
    extension_hint( url )
        .map( |ext| MEDIA_EXTENSIONS.contains( &ext.to_ascii_lowercase().as_str() ) )
        .unwrap_or( false )
}


#[cfg( test )]
mod tests {
    use super::*;


    /// Points at a local port nothing listens on.
    const DEAD_ENDPOINT: &str = "http://127.0.0.1:9/token";


    #[test]
    fn test_is_media_url() {
        assert!( is_media_url( "https://aac.cdn/abc_320.mp4" ) );
        assert!( is_media_url( "https://cdn/Song.MP3?x=1" ) );
        assert!( !is_media_url( "https://www.jiosaavn.com/api.php?__call=song.generateAuthToken" ) );
    }


    #[tokio::test]
    async fn test_known_stream_url_wins() {
        let track = Track::from_stream( "a", "A", "https://cdn/a.mp3" );
        let url = HttpResolver::new().resolve( &track ).await.unwrap();
        assert_eq!( url, "https://cdn/a.mp3" );
    }


    #[tokio::test]
    async fn test_direct_media_download_is_used_as_is() {
        let track = Track {
            id: "b".into(),
            download_urls: vec![ "https://cdn/b_160.mp4".into() ],
            ..Track::default()
        };
        let url = HttpResolver::new().resolve( &track ).await.unwrap();
        assert_eq!( url, "https://cdn/b_160.mp4" );
    }


    #[tokio::test]
    async fn test_failed_token_falls_back_to_preview() {
        let track = Track {
            id: "c".into(),
            download_urls: vec![ DEAD_ENDPOINT.into() ],
            preview_url: Some( "https://preview/c.mp4".into() ),
            ..Track::default()
        };
        let url = HttpResolver::new().resolve( &track ).await.unwrap();
        assert_eq!( url, "https://preview/c.mp4" );
    }


    #[tokio::test]
    async fn test_nothing_to_resolve() {
        let bare = Track { id: "d".into(), ..Track::default() };
        let result = HttpResolver::new().resolve( &bare ).await;
        assert_eq!( result, Err( ResolveError::NoSource( "d".into() ) ) );

        let dead = Track {
            id: "e".into(),
            download_urls: vec![ DEAD_ENDPOINT.into() ],
            ..Track::default()
        };
        let result = HttpResolver::new().resolve( &dead ).await;
        assert!( matches!( result, Err( ResolveError::Http( _ ) ) ) );
    }
}
