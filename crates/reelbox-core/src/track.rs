//! Playable tracks
//!
//! `Track` is the value the queue and player pass around. Song records from
//! the music API are normalized into it here.

use serde::Deserialize;
use serde_json::Value;


/// One artwork rendition, ordered smallest to largest by the API.
#[derive( Debug, Clone, PartialEq, Eq, Deserialize )]
pub struct ImageVariant {
    pub url: String,
}


/// A playable audio item.
#[derive( Debug, Clone, PartialEq, Default )]
pub struct Track {
    pub id: String,
    pub name: String,
    pub duration_secs: Option<f64>,
    pub artists: Vec<String>,
    pub images: Vec<ImageVariant>,

    /// Directly playable location, when already known.
    pub stream_url: Option<String>,

    /// Token endpoints that resolve to a playable location.
    pub download_urls: Vec<String>,

    /// Short preview clip used when resolution fails.
    pub preview_url: Option<String>,
}


impl Track {
    /// Creates a track that plays straight from `stream_url`.
    pub fn from_stream( id: impl Into<String>, name: impl Into<String>, stream_url: impl Into<String> ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stream_url: Some( stream_url.into() ),
            ..Self::default()
        }
    }


    /// Primary artists joined for display.
    pub fn artist_line( &self ) -> String {
        if self.artists.is_empty() {
            "Unknown Artist".to_string()
        } else {
            self.artists.join( ", " )
        }
    }


    /// Highest quality artwork URL.
    pub fn best_image( &self ) -> Option<&str> {
        self.images.last()
            .or_else( || self.images.first() )
            .map( |i| i.url.as_str() )
    }


    /// Duration as `m:ss`, empty when unknown.
    pub fn format_duration( &self ) -> String {
        match self.duration_secs {
            Some( secs ) if secs > 0.0 => format_clock( secs ),
            _ => String::new(),
        }
    }
}


/// Formats seconds as `m:ss`.
pub fn format_clock( secs: f64 ) -> String {
    let total = secs.max( 0.0 ).floor() as u64;
    format!( "{}:{:02}", total / 60, total % 60 )
}


/// Song record as returned by the music search API.
#[derive( Debug, Clone, Deserialize )]
#[serde( rename_all = "camelCase" )]
pub struct SongRecord {
    #[serde( default )]
    pub id: Option<Value>,

    #[serde( default, alias = "title" )]
    pub name: Option<String>,

    #[serde( default )]
    pub duration: Option<Value>,

    #[serde( default )]
    pub artists: Option<ArtistGroups>,

    /// Older payloads carry a comma separated artist string instead.
    #[serde( default )]
    pub primary_artists: Option<String>,

    #[serde( default )]
    pub image: Option<Value>,

    #[serde( default )]
    pub download_url: Option<Value>,

    #[serde( default )]
    pub preview_url: Option<String>,
}


#[derive( Debug, Clone, Default, Deserialize )]
pub struct ArtistGroups {
    #[serde( default )]
    pub primary: Vec<ArtistRef>,
}


#[derive( Debug, Clone, Deserialize )]
pub struct ArtistRef {
    #[serde( default )]
    pub name: String,
}


impl SongRecord {
    /// Normalizes the record. Records without an id are rejected.
    pub fn into_track( self ) -> Option<Track> {
        let id = match self.id? {
            Value::String( s ) if !s.is_empty() => s,
            Value::Number( n ) => n.to_string(),
            _ => return None,
        };

        let mut artists: Vec<String> = self.artists
            .map( |a| a.primary.into_iter().map( |r| decode_entities( &r.name ) ).collect() )
            .unwrap_or_default();
        if artists.is_empty() {
            if let Some( line ) = self.primary_artists {
                artists = line.split( ',' )
                    .map( |a| decode_entities( a.trim() ) )
                    .filter( |a| !a.is_empty() )
                    .collect();
            }
        }

        Some( Track {
            id,
            name: decode_entities( self.name.as_deref().unwrap_or( "" ) ),
            duration_secs: self.duration.as_ref().and_then( parse_seconds ),
            artists,
            images: url_list( self.image.as_ref() )
                .into_iter()
                .map( |url| ImageVariant { url } )
                .collect(),
            stream_url: None,
            download_urls: url_list( self.download_url.as_ref() ),
            preview_url: self.preview_url.filter( |u| !u.is_empty() ),
        })
    }
}


/// Accepts `245`, `245.3` or `"245"`.
fn parse_seconds( value: &Value ) -> Option<f64> {
    let secs = match value {
        Value::Number( n ) => n.as_f64()?,
        Value::String( s ) => s.trim().parse().ok()?,
        _ => return None,
    };
    ( secs.is_finite() && secs > 0.0 ).then_some( secs )
}


/// Reads `[{ "url": .. }]`, `["..", ..]` or a bare string.
fn url_list( value: Option<&Value> ) -> Vec<String> {
    let entry_url = |v: &Value| match v {
        Value::String( s ) => Some( s.clone() ),
        Value::Object( map ) => map.get( "url" )
            .or_else( || map.get( "link" ) )
            .and_then( Value::as_str )
            .map( str::to_string ),
        _ => None,
    };

    match value {
        Some( Value::Array( entries ) ) => entries.iter()
            .filter_map( entry_url )
            .filter( |u| !u.is_empty() )
            .collect(),
        Some( Value::String( s ) ) if !s.is_empty() => vec![ s.clone() ],
        _ => Vec::new(),
    }
}


/// Decodes the handful of HTML entities the music API leaves in names.
pub fn decode_entities( s: &str ) -> String {
    if !s.contains( '&' ) {
        return s.to_string();
    }

    s.replace( "&quot;", "\"" )
        .replace( "&#039;", "'" )
        .replace( "&#39;", "'" )
        .replace( "&apos;", "'" )
        .replace( "&lt;", "<" )
        .replace( "&gt;", ">" )
        .replace( "&amp;", "&" )
}


#[cfg( test )]
mod tests {
    use super::*;


    fn record( json: &str ) -> SongRecord {
        serde_json::from_str( json ).unwrap()
    }


    #[test]
    fn test_normalizes_current_payload() {
        let track = record( r#"{
            "id": "Xy12",
            "name": "Rock &amp; Roll &quot;Live&quot;",
            "duration": 245,
            "artists": { "primary": [ { "name": "A" }, { "name": "B" } ] },
            "image": [ { "quality": "50x50", "url": "small.jpg" }, { "quality": "500x500", "url": "large.jpg" } ],
            "downloadUrl": [ { "quality": "320kbps", "url": "https://token/1" } ],
            "previewUrl": "https://preview/1"
        }"# ).into_track().unwrap();

        assert_eq!( track.id, "Xy12" );
        assert_eq!( track.name, "Rock & Roll \"Live\"" );
        assert_eq!( track.duration_secs, Some( 245.0 ) );
        assert_eq!( track.artist_line(), "A, B" );
        assert_eq!( track.best_image(), Some( "large.jpg" ) );
        assert_eq!( track.download_urls, vec![ "https://token/1".to_string() ] );
        assert_eq!( track.preview_url.as_deref(), Some( "https://preview/1" ) );
        assert!( track.stream_url.is_none() );
    }


    #[test]
    fn test_normalizes_legacy_payload() {
        let track = record( r#"{
            "id": 77,
            "title": "Old Song",
            "duration": "183",
            "primaryArtists": "C, D &amp; E",
            "image": "cover.jpg"
        }"# ).into_track().unwrap();

        assert_eq!( track.id, "77" );
        assert_eq!( track.name, "Old Song" );
        assert_eq!( track.duration_secs, Some( 183.0 ) );
        assert_eq!( track.artists, vec![ "C".to_string(), "D & E".to_string() ] );
        assert_eq!( track.best_image(), Some( "cover.jpg" ) );
    }


    #[test]
    fn test_record_without_id_is_rejected() {
        assert!( record( r#"{ "name": "Nameless" }"# ).into_track().is_none() );
        assert!( record( r#"{ "id": "", "name": "Blank" }"# ).into_track().is_none() );
    }


    #[test]
    fn test_missing_fields_default() {
        let track = record( r#"{ "id": "a", "duration": null }"# ).into_track().unwrap();

        assert_eq!( track.artist_line(), "Unknown Artist" );
        assert_eq!( track.best_image(), None );
        assert_eq!( track.duration_secs, None );
        assert_eq!( track.format_duration(), "" );
    }


    #[test]
    fn test_format_clock() {
        assert_eq!( format_clock( 0.0 ), "0:00" );
        assert_eq!( format_clock( 65.9 ), "1:05" );
        assert_eq!( format_clock( 600.0 ), "10:00" );
        assert_eq!( format_clock( -3.0 ), "0:00" );
    }
}
