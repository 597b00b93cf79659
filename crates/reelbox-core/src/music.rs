//! Music search client
//!
//! Talks to a Saavn-compatible song search API and normalizes every record
//! into a [`Track`]. Like the catalog client it never surfaces errors: a
//! failed request, an unsuccessful response or an unexpected payload all
//! come back as an empty list.

use serde_json::Value;

use crate::track::{ SongRecord, Track };


/// Default API root.
pub const SAAVN_BASE_URL: &str = "https://saavn.me/api";

/// Languages offered for trending songs. The first is the default.
pub const LANGUAGES: &[&str] = &[
    "telugu", "hindi", "english", "tamil", "kannada", "malayalam", "punjabi",
];

/// Page size used when the caller does not care.
pub const DEFAULT_LIMIT: u32 = 20;


/// Async client for the song search API.
#[derive( Debug, Clone )]
pub struct MusicClient {
    client: reqwest::Client,
    base_url: String,
}


impl Default for MusicClient {
    fn default() -> Self {
        Self::new()
    }
}


impl MusicClient {
    pub fn new() -> Self {
        Self::with_base_url( SAAVN_BASE_URL )
    }


    pub fn with_base_url( base_url: impl Into<String> ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches( '/' ).to_string(),
        }
    }


    /// Searches songs by free text.
    pub async fn search( &self, query: &str, limit: u32 ) -> Vec<Track> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        match self.fetch( query, limit ).await {
            Ok( body ) => {
                let tracks = parse_tracks( &body );
                tracing::debug!( "Song search '{}' returned {} tracks", query, tracks.len() );
                tracks
            }
            Err( e ) => {
                tracing::warn!( "Song search '{}' failed: {}", query, e );
                Vec::new()
            }
        }
    }


    /// Popular songs in a language.
    pub async fn trending( &self, language: &str, limit: u32 ) -> Vec<Track> {
        let language = match language.trim() {
            "" => LANGUAGES[ 0 ],
            other => other,
        };
        self.search( &format!( "top {} songs", language ), limit ).await
    }


    async fn fetch( &self, query: &str, limit: u32 ) -> Result<Value, reqwest::Error> {
        let limit = limit.max( 1 ).to_string();

        self.client
            .get( format!( "{}/search/songs", self.base_url ) )
            .query( &[ ( "query", query ), ( "limit", limit.as_str() ) ] )
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    }
}


/// Extracts tracks from a search response.
///
/// Accepts `{ success, data: { results } }`, a bare `{ results }` or a bare
/// `{ data: [..] }`. Records that fail to normalize are skipped.
pub fn parse_tracks( body: &Value ) -> Vec<Track> {
    if body.get( "success" ).and_then( Value::as_bool ) == Some( false ) {
        tracing::warn!( "Song search reported failure" );
        return Vec::new();
    }

    let results = body.pointer( "/data/results" )
        .or_else( || body.get( "results" ) )
        .or_else( || body.get( "data" ).filter( |d| d.is_array() ) )
        .and_then( Value::as_array );

    let Some( results ) = results else {
        tracing::warn!( "Song search response has no results" );
        return Vec::new();
    };

    results
        .iter()
        .filter_map( |raw| match serde_json::from_value::<SongRecord>( raw.clone() ) {
            Ok( record ) => record.into_track(),
            Err( e ) => {
                tracing::debug!( "Skipping malformed song record: {}", e );
                None
            }
        })
        .collect()
}


#[cfg( test )]
mod tests {
    use super::*;
    use serde_json::json;


    #[test]
    fn test_parse_nested_results() {
        let body = json!({
            "success": true,
            "data": {
                "total": 2,
                "results": [
                    {
                        "id": "abc",
                        "name": "Rock &amp; Roll",
                        "duration": "215",
                        "artists": { "primary": [ { "name": "A" }, { "name": "B" } ] },
                        "image": [ { "quality": "50x50", "url": "small" }, { "quality": "500x500", "url": "large" } ],
                        "downloadUrl": [ { "quality": "320kbps", "url": "https://aac.cdn/abc_320.mp4" } ]
                    },
                    { "name": "No id" }
                ]
            }
        });

        let tracks = parse_tracks( &body );
        assert_eq!( tracks.len(), 1 );

        let t = &tracks[ 0 ];
        assert_eq!( t.id, "abc" );
        assert_eq!( t.name, "Rock & Roll" );
        assert_eq!( t.duration_secs, Some( 215.0 ) );
        assert_eq!( t.artist_line(), "A, B" );
        assert_eq!( t.best_image(), Some( "large" ) );
        assert_eq!( t.download_urls, vec![ "https://aac.cdn/abc_320.mp4".to_string() ] );
    }


    #[test]
    fn test_parse_flat_results() {
        let body = json!({
            "results": [ { "id": 7, "title": "Legacy", "primaryArtists": "X, Y", "duration": 90 } ]
        });

        let tracks = parse_tracks( &body );
        assert_eq!( tracks.len(), 1 );
        assert_eq!( tracks[ 0 ].id, "7" );
        assert_eq!( tracks[ 0 ].artists, vec![ "X".to_string(), "Y".to_string() ] );
    }


    #[test]
    fn test_unsuccessful_or_unexpected_payload_is_empty() {
        assert!( parse_tracks( &json!({ "success": false, "data": { "results": [ { "id": "a" } ] } }) ).is_empty() );
        assert!( parse_tracks( &json!({ "message": "rate limited" }) ).is_empty() );
        assert!( parse_tracks( &json!( [] ) ).is_empty() );
    }


    #[test]
    fn test_malformed_record_is_skipped() {
        let body = json!({
            "data": { "results": [ { "id": "ok", "name": "Fine" }, { "id": "bad", "artists": 5 } ] }
        });

        let ids: Vec<String> = parse_tracks( &body ).into_iter().map( |t| t.id ).collect();
        assert_eq!( ids, vec![ "ok".to_string() ] );
    }


    #[tokio::test]
    async fn test_blank_query_skips_request() {
        let client = MusicClient::with_base_url( "http://127.0.0.1:9" );
        assert!( client.search( "   ", 10 ).await.is_empty() );
    }


    #[tokio::test]
    async fn test_unreachable_api_yields_no_tracks() {
        let client = MusicClient::with_base_url( "http://127.0.0.1:9" );
        assert!( client.trending( "hindi", DEFAULT_LIMIT ).await.is_empty() );
    }
}
