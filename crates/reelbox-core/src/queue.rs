//! Playback queue
//!
//! An ordered list of tracks with a cursor. Navigation wraps in both
//! directions; the cursor is always a valid position or `None`.

use crate::track::Track;


/// Ordered tracks plus the position of the current one.
#[derive( Debug, Clone, Default )]
pub struct Queue {
    tracks: Vec<Track>,
    current_index: Option<usize>,
}


impl Queue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }


    /// Replaces every track. The selection is cleared.
    pub fn replace( &mut self, tracks: Vec<Track> ) {
        self.tracks = tracks;
        self.current_index = None;
    }


    /// Adds a track to the end of the queue.
    pub fn add( &mut self, track: Track ) {
        self.tracks.push( track );
    }


    /// Clears the queue.
    pub fn clear( &mut self ) {
        self.tracks.clear();
        self.current_index = None;
    }


    /// Removes a track at the specified index.
    pub fn remove( &mut self, index: usize ) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }

        let removed = self.tracks.remove( index );

        // Adjust current index if needed
        if let Some( current ) = self.current_index {
            if index < current {
                self.current_index = Some( current - 1 );
            } else if index == current {
                self.current_index = None;
            }
        }

        Some( removed )
    }


    /// Gets the current track.
    pub fn current( &self ) -> Option<&Track> {
        self.current_index.and_then( |i| self.tracks.get( i ) )
    }


    /// Finds the first track with the given id.
    pub fn position_of( &self, id: &str ) -> Option<usize> {
        self.tracks.iter().position( |t| t.id == id )
    }


    /// Points the cursor at the first track with this id, or clears it.
    pub fn select( &mut self, id: &str ) -> Option<usize> {
        self.current_index = self.position_of( id );
        self.current_index
    }


    /// Clears the cursor without touching the tracks.
    pub fn deselect( &mut self ) {
        self.current_index = None;
    }


    /// Advances to the next track, wrapping to the first.
    ///
    /// With no selection the first track is chosen.
    pub fn advance( &mut self ) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }

        let next = match self.current_index {
            Some( current ) => ( current + 1 ) % self.tracks.len(),
            None => 0,
        };

        self.current_index = Some( next );
        self.current()
    }


    /// Goes back one track, wrapping to the last.
    ///
    /// With no selection the last track is chosen.
    pub fn retreat( &mut self ) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }

        let prev = match self.current_index {
            Some( current ) if current > 0 => current - 1,
            _ => self.tracks.len() - 1,
        };

        self.current_index = Some( prev );
        self.current()
    }


    /// Gets all tracks in the queue.
    pub fn tracks( &self ) -> &[Track] {
        &self.tracks
    }


    /// Gets the number of tracks.
    pub fn len( &self ) -> usize {
        self.tracks.len()
    }


    /// Returns true if the queue is empty.
    pub fn is_empty( &self ) -> bool {
        self.tracks.is_empty()
    }


    /// Gets the current track index.
    pub fn current_index( &self ) -> Option<usize> {
        self.current_index
    }


    /// Moves a track from one position to another.
    ///
    /// @param from - Source index
    /// @param to - Destination index
    ///
    /// @returns true if the move was successful
    pub fn move_track( &mut self, from: usize, to: usize ) -> bool {
        if from >= self.tracks.len() || to >= self.tracks.len() {
            return false;
        }

        if from == to {
            return true;
        }

        let track = self.tracks.remove( from );
        self.tracks.insert( to, track );

        // Adjust current index if affected
        if let Some( current ) = self.current_index {
            if current == from {
                self.current_index = Some( to );
            } else if from < current && current <= to {
                self.current_index = Some( current - 1 );
            } else if to <= current && current < from {
                self.current_index = Some( current + 1 );
            }
        }

        true
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn track( id: &str ) -> Track {
        Track::from_stream( id, id.to_uppercase(), format!( "https://cdn/{}.mp3", id ) )
    }


    fn queue( ids: &[&str] ) -> Queue {
        let mut q = Queue::new();
        q.replace( ids.iter().map( |id| track( id ) ).collect() );
        q
    }


    fn current_id( q: &Queue ) -> Option<&str> {
        q.current().map( |t| t.id.as_str() )
    }


    #[test]
    fn test_advance_wraps_forward() {
        let mut q = queue( &[ "a", "b", "c" ] );
        q.select( "b" );

        assert_eq!( q.advance().map( |t| t.id.as_str() ), Some( "c" ) );
        assert_eq!( q.advance().map( |t| t.id.as_str() ), Some( "a" ) );
    }


    #[test]
    fn test_retreat_wraps_backward() {
        let mut q = queue( &[ "a", "b", "c" ] );
        q.select( "a" );

        assert_eq!( q.retreat().map( |t| t.id.as_str() ), Some( "c" ) );
        assert_eq!( q.retreat().map( |t| t.id.as_str() ), Some( "b" ) );
    }


    #[test]
    fn test_unselected_queue_starts_at_ends() {
        let mut q = queue( &[ "a", "b", "c" ] );
        assert_eq!( q.advance().map( |t| t.id.as_str() ), Some( "a" ) );

        let mut q = queue( &[ "a", "b", "c" ] );
        assert_eq!( q.retreat().map( |t| t.id.as_str() ), Some( "c" ) );
    }


    #[test]
    fn test_next_then_previous_round_trips() {
        for len in 1..=5 {
            let ids: Vec<String> = ( 0..len ).map( |i| format!( "t{}", i ) ).collect();
            let refs: Vec<&str> = ids.iter().map( String::as_str ).collect();

            for start in 0..len {
                let mut q = queue( &refs );
                q.select( refs[ start ] );
                q.advance();
                q.retreat();
                assert_eq!( q.current_index(), Some( start ), "len {} start {}", len, start );
            }
        }
    }


    #[test]
    fn test_full_cycle_returns_to_start() {
        let mut q = queue( &[ "a", "b", "c", "d" ] );
        q.select( "c" );

        for _ in 0..q.len() {
            q.advance();
        }

        assert_eq!( q.current_index(), Some( 2 ) );
    }


    #[test]
    fn test_empty_queue_navigation_is_noop() {
        let mut q = Queue::new();
        assert!( q.advance().is_none() );
        assert!( q.retreat().is_none() );
        assert_eq!( q.current_index(), None );
    }


    #[test]
    fn test_select_unknown_id_clears_cursor() {
        let mut q = queue( &[ "a", "b" ] );
        q.select( "b" );
        assert_eq!( q.select( "zzz" ), None );
        assert_eq!( q.current_index(), None );
    }


    #[test]
    fn test_replace_resets_selection() {
        let mut q = queue( &[ "a", "b", "c" ] );
        q.select( "c" );

        q.replace( vec![ track( "x" ) ] );

        assert_eq!( q.current_index(), None );
        assert_eq!( q.len(), 1 );
    }


    #[test]
    fn test_remove_adjusts_cursor() {
        let mut q = queue( &[ "a", "b", "c" ] );
        q.select( "c" );

        q.remove( 0 );
        assert_eq!( current_id( &q ), Some( "c" ) );

        q.remove( 1 );
        assert_eq!( q.current_index(), None );
        assert!( q.remove( 5 ).is_none() );
    }


    #[test]
    fn test_move_track_keeps_current() {
        let mut q = queue( &[ "a", "b", "c", "d" ] );
        q.select( "c" );

        assert!( q.move_track( 0, 3 ) );
        assert_eq!( current_id( &q ), Some( "c" ) );

        assert!( q.move_track( 1, 0 ) );
        assert_eq!( current_id( &q ), Some( "c" ) );
        assert!( !q.move_track( 0, 9 ) );
    }
}
