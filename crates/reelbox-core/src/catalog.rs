//! Movie and TV metadata client
//!
//! Wraps the TMDB v3 endpoints used for browsing: daily trending, discover
//! and title search. Requests never fail from the caller's point of view; any
//! network, status or parse problem is logged and turns into an empty page.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::library::{ null_as_default, LibraryItem, MediaType };


/// Default API root.
pub const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Base URL for poster and backdrop images.
pub const TMDB_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w300";


/// One movie, show or person as returned by the API.
#[derive( Debug, Clone, Default, PartialEq, Deserialize )]
pub struct ContentRecord {
    pub id: i64,

    /// Movies carry `title`, shows carry `name`.
    #[serde( default )]
    pub title: Option<String>,

    #[serde( default )]
    pub name: Option<String>,

    #[serde( default )]
    pub poster_path: Option<String>,

    #[serde( default )]
    pub backdrop_path: Option<String>,

    #[serde( default, deserialize_with = "null_as_default" )]
    pub overview: String,

    #[serde( default )]
    pub release_date: Option<String>,

    #[serde( default )]
    pub first_air_date: Option<String>,

    #[serde( default, deserialize_with = "null_as_default" )]
    pub vote_average: f64,

    #[serde( default, deserialize_with = "null_as_default" )]
    pub popularity: f64,

    #[serde( default, deserialize_with = "null_as_default" )]
    pub genre_ids: Vec<i64>,

    #[serde( default )]
    pub original_language: Option<String>,

    /// Only present on mixed results such as trending.
    #[serde( default )]
    pub media_type: Option<String>,
}


impl ContentRecord {
    /// Title for display, whichever field the record uses.
    pub fn display_title( &self ) -> &str {
        self.title
            .as_deref()
            .or( self.name.as_deref() )
            .unwrap_or( "Untitled" )
    }


    /// Release or first air date, empty when unknown.
    pub fn date( &self ) -> &str {
        self.release_date
            .as_deref()
            .filter( |d| !d.is_empty() )
            .or( self.first_air_date.as_deref() )
            .unwrap_or( "" )
    }


    /// Year component of the date.
    pub fn year( &self ) -> Option<i32> {
        self.date().get( ..4 ).and_then( |y| y.parse().ok() )
    }


    /// The record's own media type, or `fallback` when it has none.
    pub fn media_type_or( &self, fallback: MediaType ) -> MediaType {
        match self.media_type.as_deref() {
            Some( "tv" ) => MediaType::Tv,
            Some( "movie" ) => MediaType::Movie,
            _ => fallback,
        }
    }


    /// Full poster URL, if the record has a poster.
    pub fn poster_url( &self ) -> Option<String> {
        self.poster_path.as_ref().map( |p| format!( "{}{}", TMDB_IMAGE_BASE_URL, p ) )
    }


    /// The subset of fields the library keeps.
    pub fn to_library_item( &self, fallback: MediaType ) -> LibraryItem {
        LibraryItem {
            id: self.id,
            title: self.display_title().to_string(),
            poster_path: self.poster_path.clone(),
            media_type: self.media_type_or( fallback ),
            vote_average: self.vote_average,
            release_date: self.date().to_string(),
        }
    }
}


/// One page of results.
#[derive( Debug, Clone, Default, PartialEq, Deserialize )]
pub struct CatalogPage {
    #[serde( default )]
    pub page: u32,

    #[serde( default, deserialize_with = "null_as_default" )]
    pub results: Vec<ContentRecord>,

    #[serde( default )]
    pub total_pages: u32,

    #[serde( default )]
    pub total_results: u32,
}


impl CatalogPage {
    pub fn is_empty( &self ) -> bool {
        self.results.is_empty()
    }
}


/// Result ordering for discover queries.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum SortBy {
    #[default]
    PopularityDesc,
    PopularityAsc,
    RatingDesc,
    RatingAsc,
    ReleaseDesc,
    ReleaseAsc,
}


impl SortBy {
    pub const ALL: [SortBy; 6] = [
        SortBy::PopularityDesc,
        SortBy::PopularityAsc,
        SortBy::RatingDesc,
        SortBy::RatingAsc,
        SortBy::ReleaseDesc,
        SortBy::ReleaseAsc,
    ];


    /// Value of the `sort_by` parameter. Release ordering uses a different
    /// field for shows.
    pub fn api_value( &self, media_type: MediaType ) -> &'static str {
        match ( self, media_type ) {
            ( SortBy::PopularityDesc, _ ) => "popularity.desc",
            ( SortBy::PopularityAsc, _ ) => "popularity.asc",
            ( SortBy::RatingDesc, _ ) => "vote_average.desc",
            ( SortBy::RatingAsc, _ ) => "vote_average.asc",
            ( SortBy::ReleaseDesc, MediaType::Movie ) => "primary_release_date.desc",
            ( SortBy::ReleaseAsc, MediaType::Movie ) => "primary_release_date.asc",
            ( SortBy::ReleaseDesc, MediaType::Tv ) => "first_air_date.desc",
            ( SortBy::ReleaseAsc, MediaType::Tv ) => "first_air_date.asc",
        }
    }
}


impl fmt::Display for SortBy {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        let label = match self {
            SortBy::PopularityDesc => "popular",
            SortBy::PopularityAsc => "unpopular",
            SortBy::RatingDesc => "top-rated",
            SortBy::RatingAsc => "low-rated",
            SortBy::ReleaseDesc => "newest",
            SortBy::ReleaseAsc => "oldest",
        };
        f.write_str( label )
    }
}


impl FromStr for SortBy {
    type Err = String;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "popular" | "popularity" | "popularity.desc" => Ok( SortBy::PopularityDesc ),
            "unpopular" | "popularity.asc" => Ok( SortBy::PopularityAsc ),
            "top-rated" | "rating" | "vote_average.desc" => Ok( SortBy::RatingDesc ),
            "low-rated" | "vote_average.asc" => Ok( SortBy::RatingAsc ),
            "newest" | "new" | "primary_release_date.desc" | "first_air_date.desc" => Ok( SortBy::ReleaseDesc ),
            "oldest" | "old" | "primary_release_date.asc" | "first_air_date.asc" => Ok( SortBy::ReleaseAsc ),
            other => Err( format!( "Unknown sort order: '{}'", other ) ),
        }
    }
}


/// A named genre id usable in [`DiscoverQuery::genres`].
#[derive( Debug, Clone, PartialEq, Eq, Deserialize )]
pub struct Genre {
    pub id: i64,

    #[serde( default, deserialize_with = "null_as_default" )]
    pub name: String,
}


#[derive( Debug, Default, Deserialize )]
struct GenreList {
    #[serde( default )]
    genres: Vec<Genre>,
}


/// Server-side filters for a discover request.
#[derive( Debug, Clone, PartialEq )]
pub struct DiscoverQuery {
    pub sort: SortBy,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    /// Only applied when above zero
    pub min_rating: f64,
    pub genres: Vec<i64>,
    /// ISO 639-1 code
    pub original_language: Option<String>,
    pub page: u32,
}


impl Default for DiscoverQuery {
    fn default() -> Self {
        Self {
            sort: SortBy::default(),
            year_from: None,
            year_to: None,
            min_rating: 0.0,
            genres: Vec::new(),
            original_language: None,
            page: 1,
        }
    }
}


impl DiscoverQuery {
    /// Query for one page with default filters.
    pub fn page( page: u32 ) -> Self {
        Self { page: page.max( 1 ), ..Self::default() }
    }


    /// Carries the client-side filter over to the server: the year becomes a
    /// single-year release range.
    pub fn narrowed_by( mut self, filter: &ContentFilter ) -> Self {
        if let Some( year ) = filter.year.as_deref().and_then( |y| y.parse::<i32>().ok() ) {
            self.year_from = Some( year );
            self.year_to = Some( year );
        }
        if filter.min_rating > 0.0 {
            self.min_rating = filter.min_rating;
        }
        if filter.language.is_some() {
            self.original_language = filter.language.clone();
        }
        self
    }


    /// Query parameters, without the API key.
    pub fn params( &self, media_type: MediaType ) -> Vec<( String, String )> {
        let date_field = match media_type {
            MediaType::Movie => "primary_release_date",
            MediaType::Tv => "first_air_date",
        };

        let genres = self.genres
            .iter()
            .map( |g| g.to_string() )
            .collect::<Vec<_>>()
            .join( "," );

        let mut params = vec![
            ( "language".to_string(), "en-US".to_string() ),
            ( "sort_by".to_string(), self.sort.api_value( media_type ).to_string() ),
            ( "include_adult".to_string(), "false".to_string() ),
            ( "include_video".to_string(), "false".to_string() ),
            ( "page".to_string(), self.page.max( 1 ).to_string() ),
            ( "with_genres".to_string(), genres ),
        ];

        if let Some( from ) = self.year_from {
            params.push(( format!( "{}.gte", date_field ), format!( "{}-01-01", from ) ));
        }
        if let Some( to ) = self.year_to {
            params.push(( format!( "{}.lte", date_field ), format!( "{}-12-31", to ) ));
        }
        if self.min_rating > 0.0 {
            params.push(( "vote_average.gte".to_string(), self.min_rating.to_string() ));
        }
        if let Some( language ) = &self.original_language {
            params.push(( "with_original_language".to_string(), language.clone() ));
        }

        params
    }
}


/// Client-side narrowing for search results. Discover requests take the
/// same settings server-side through [`DiscoverQuery::narrowed_by`].
#[derive( Debug, Clone, Default, PartialEq )]
pub struct ContentFilter {
    /// Year prefix of the release date, e.g. "2019"
    pub year: Option<String>,
    pub min_rating: f64,
    /// ISO 639-1 code matched against `original_language`
    pub language: Option<String>,
}


impl ContentFilter {
    pub fn is_empty( &self ) -> bool {
        self.year.is_none() && self.min_rating <= 0.0 && self.language.is_none()
    }


    pub fn matches( &self, record: &ContentRecord ) -> bool {
        if let Some( year ) = &self.year {
            let date = record.date();
            if date.is_empty() || !date.starts_with( year.as_str() ) {
                return false;
            }
        }

        if self.min_rating > 0.0 && record.vote_average < self.min_rating {
            return false;
        }

        if let Some( language ) = &self.language {
            if record.original_language.as_deref() != Some( language.as_str() ) {
                return false;
            }
        }

        true
    }


    /// Drops non-matching records. With any filter active the total reflects
    /// the filtered count.
    pub fn apply( &self, mut page: CatalogPage ) -> CatalogPage {
        if self.is_empty() {
            return page;
        }

        page.results.retain( |r| self.matches( r ) );
        page.total_results = page.results.len() as u32;
        page
    }
}


/// Async client for the metadata API.
#[derive( Debug, Clone )]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}


impl CatalogClient {
    pub fn new( api_key: impl Into<String> ) -> Self {
        Self::with_base_url( TMDB_BASE_URL, api_key )
    }


    pub fn with_base_url( base_url: impl Into<String>, api_key: impl Into<String> ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches( '/' ).to_string(),
            api_key: api_key.into(),
        }
    }


    /// Returns true if an API key was configured.
    pub fn has_api_key( &self ) -> bool {
        !self.api_key.is_empty()
    }


    /// Today's trending movies and shows. People are left out.
    pub async fn trending( &self, page: u32 ) -> CatalogPage {
        let params = vec![ ( "page".to_string(), page.max( 1 ).to_string() ) ];
        let mut result = self.get_page( "/trending/all/day", params ).await;
        result.results.retain( |r| r.media_type.as_deref() != Some( "person" ) );
        result
    }


    /// Browses one media type with server-side filters.
    pub async fn discover( &self, media_type: MediaType, query: &DiscoverQuery ) -> CatalogPage {
        let path = format!( "/discover/{}", media_type.as_str() );
        self.get_page( &path, query.params( media_type ) ).await
    }


    /// Searches titles of one media type.
    pub async fn search( &self, media_type: MediaType, text: &str, page: u32 ) -> CatalogPage {
        let text = text.trim();
        if text.is_empty() {
            return CatalogPage::default();
        }

        let params = vec![
            ( "language".to_string(), "en-US".to_string() ),
            ( "query".to_string(), text.to_string() ),
            ( "page".to_string(), page.max( 1 ).to_string() ),
            ( "include_adult".to_string(), "false".to_string() ),
        ];
        self.get_page( &format!( "/search/{}", media_type.as_str() ), params ).await
    }


    /// Genres available for one media type.
    pub async fn genres( &self, media_type: MediaType ) -> Vec<Genre> {
        let path = format!( "/genre/{}/list", media_type.as_str() );
        let params = [ ( "language".to_string(), "en-US".to_string() ) ];

        match self.fetch::<GenreList>( &path, &params ).await {
            Ok( list ) => list.genres,
            Err( e ) => {
                tracing::warn!( "Catalog request {} failed: {}", path, e );
                Vec::new()
            }
        }
    }


    async fn get_page( &self, path: &str, params: Vec<( String, String )> ) -> CatalogPage {
        match self.fetch::<CatalogPage>( path, &params ).await {
            Ok( page ) => {
                tracing::debug!( "{} returned {} results", path, page.results.len() );
                page
            }
            Err( e ) => {
                tracing::warn!( "Catalog request {} failed: {}", path, e );
                CatalogPage::default()
            }
        }
    }


    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[( String, String )],
    ) -> Result<T, reqwest::Error> {
        let url = format!( "{}{}", self.base_url, path );

        self.client
            .get( url )
            .query( &[ ( "api_key", self.api_key.as_str() ) ] )
            .query( params )
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    const SAMPLE: &str = r#"{
        "page": 1,
        "results": [
            { "id": 1, "title": "Arrival", "release_date": "2016-11-10", "vote_average": 7.6,
              "popularity": 50.0, "original_language": "en", "media_type": "movie",
              "poster_path": "/arrival.jpg", "genre_ids": [18, 878] },
            { "id": 2, "name": "Dark", "first_air_date": "2017-12-01", "vote_average": 8.4,
              "popularity": 80.0, "original_language": "de", "media_type": "tv", "overview": null },
            { "id": 3, "name": "Some Actor", "media_type": "person", "popularity": 99.0 },
            { "id": 4, "title": "Parasite", "release_date": "2019-05-30", "vote_average": 8.5,
              "popularity": 60.0, "original_language": "ko", "poster_path": null }
        ],
        "total_pages": 7,
        "total_results": 130
    }"#;


    fn sample() -> CatalogPage {
        serde_json::from_str( SAMPLE ).unwrap()
    }


    fn ids( page: &CatalogPage ) -> Vec<i64> {
        page.results.iter().map( |r| r.id ).collect()
    }


    #[test]
    fn test_parse_page() {
        let page = sample();
        assert_eq!( page.total_pages, 7 );
        assert_eq!( page.results.len(), 4 );

        let dark = &page.results[ 1 ];
        assert_eq!( dark.display_title(), "Dark" );
        assert_eq!( dark.date(), "2017-12-01" );
        assert_eq!( dark.year(), Some( 2017 ) );
        assert_eq!( dark.overview, "" );
    }


    #[test]
    fn test_to_library_item() {
        let page = sample();

        let arrival = page.results[ 0 ].to_library_item( MediaType::Tv );
        assert_eq!( arrival.title, "Arrival" );
        assert_eq!( arrival.media_type, MediaType::Movie );
        assert_eq!( arrival.release_date, "2016-11-10" );
        assert_eq!( arrival.poster_path.as_deref(), Some( "/arrival.jpg" ) );

        // No media_type on the record, so the caller's context decides
        let parasite = page.results[ 3 ].to_library_item( MediaType::Movie );
        assert_eq!( parasite.media_type, MediaType::Movie );
        assert_eq!( parasite.vote_average, 8.5 );
    }


    #[test]
    fn test_filter_by_year_rating_and_language() {
        let filter = ContentFilter { year: Some( "2019".into() ), ..ContentFilter::default() };
        assert_eq!( ids( &filter.apply( sample() ) ), vec![ 4 ] );

        let filter = ContentFilter { min_rating: 8.0, ..ContentFilter::default() };
        assert_eq!( ids( &filter.apply( sample() ) ), vec![ 2, 4 ] );

        let filter = ContentFilter { language: Some( "de".into() ), ..ContentFilter::default() };
        let page = filter.apply( sample() );
        assert_eq!( ids( &page ), vec![ 2 ] );
        assert_eq!( page.total_results, 1 );
    }


    #[test]
    fn test_empty_filter_keeps_totals() {
        let page = ContentFilter::default().apply( sample() );
        assert_eq!( page.results.len(), 4 );
        assert_eq!( page.total_results, 130 );
    }


    #[test]
    fn test_sort_api_values() {
        assert_eq!( SortBy::ReleaseDesc.api_value( MediaType::Movie ), "primary_release_date.desc" );
        assert_eq!( SortBy::ReleaseDesc.api_value( MediaType::Tv ), "first_air_date.desc" );

        for sort in SortBy::ALL {
            assert_eq!( sort.to_string().parse::<SortBy>(), Ok( sort ) );
        }
        assert!( "sideways".parse::<SortBy>().is_err() );
    }


    #[test]
    fn test_discover_params() {
        let query = DiscoverQuery {
            year_from: Some( 2000 ),
            year_to: Some( 2010 ),
            min_rating: 7.5,
            genres: vec![ 18, 80 ],
            ..DiscoverQuery::page( 3 )
        };

        let params = query.params( MediaType::Tv );
        let get = |key: &str| params.iter().find( |( k, _ )| k == key ).map( |( _, v )| v.as_str() );

        assert_eq!( get( "page" ), Some( "3" ) );
        assert_eq!( get( "with_genres" ), Some( "18,80" ) );
        assert_eq!( get( "first_air_date.gte" ), Some( "2000-01-01" ) );
        assert_eq!( get( "first_air_date.lte" ), Some( "2010-12-31" ) );
        assert_eq!( get( "vote_average.gte" ), Some( "7.5" ) );
        assert_eq!( get( "primary_release_date.gte" ), None );
    }


    #[test]
    fn test_default_discover_has_no_rating_filter() {
        let params = DiscoverQuery::default().params( MediaType::Movie );
        assert!( params.iter().all( |( k, _ )| k != "vote_average.gte" ) );
        assert!( params.iter().any( |( k, v )| k == "sort_by" && v == "popularity.desc" ) );
    }


    #[test]
    fn test_filter_narrows_discover() {
        let filter = ContentFilter {
            year: Some( "2019".into() ),
            min_rating: 6.0,
            language: Some( "ko".into() ),
        };
        let query = DiscoverQuery { genres: vec![ 18 ], ..DiscoverQuery::page( 2 ) }.narrowed_by( &filter );

        let params = query.params( MediaType::Movie );
        let get = |key: &str| params.iter().find( |( k, _ )| k == key ).map( |( _, v )| v.as_str() );

        assert_eq!( get( "with_genres" ), Some( "18" ) );
        assert_eq!( get( "primary_release_date.gte" ), Some( "2019-01-01" ) );
        assert_eq!( get( "primary_release_date.lte" ), Some( "2019-12-31" ) );
        assert_eq!( get( "vote_average.gte" ), Some( "6" ) );
        assert_eq!( get( "with_original_language" ), Some( "ko" ) );
        assert_eq!( get( "page" ), Some( "2" ) );
    }


    #[test]
    fn test_empty_filter_leaves_discover_alone() {
        let query = DiscoverQuery::page( 1 ).narrowed_by( &ContentFilter::default() );
        assert_eq!( query, DiscoverQuery::default() );
    }


    #[test]
    fn test_parse_genre_list() {
        let list: GenreList = serde_json::from_str(
            r#"{ "genres": [ { "id": 28, "name": "Action" }, { "id": 18, "name": null } ] }"#
        ).unwrap();

        assert_eq!( list.genres.len(), 2 );
        assert_eq!( list.genres[ 0 ], Genre { id: 28, name: "Action".into() } );
        assert_eq!( list.genres[ 1 ].name, "" );
    }


    #[tokio::test]
    async fn test_unreachable_api_yields_empty_page() {
        let client = CatalogClient::with_base_url( "http://127.0.0.1:9", "key" );

        assert!( client.trending( 1 ).await.is_empty() );
        assert!( client.discover( MediaType::Movie, &DiscoverQuery::default() ).await.is_empty() );
        assert!( client.search( MediaType::Tv, "dark", 1 ).await.is_empty() );
        assert!( client.genres( MediaType::Movie ).await.is_empty() );
    }
}
