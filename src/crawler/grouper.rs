//! Album grouping for fetched history messages.

use std::collections::HashMap;

use crate::platform::HistoryMessage;

/// Partition messages into publish units. Messages sharing a non-zero
/// `grouped_id` form one album, ordered by message id ascending; everything
/// else is a singleton. Albums come first (in order of first appearance),
/// then singletons in their incoming order.
pub fn group_by_album(messages: Vec<HistoryMessage>) -> Vec<Vec<HistoryMessage>> {
    let mut albums: Vec<(i64, Vec<HistoryMessage>)> = Vec::new();
    let mut album_index: HashMap<i64, usize> = HashMap::new();
    let mut singletons: Vec<Vec<HistoryMessage>> = Vec::new();

    for message in messages {
        match message.grouped_id.filter(|&g| g != 0) {
            Some(gid) => {
                if let Some(&idx) = album_index.get(&gid) {
                    albums[idx].1.push(message);
                } else {
                    album_index.insert(gid, albums.len());
                    albums.push((gid, vec![message]));
                }
            }
            None => singletons.push(vec![message]),
        }
    }

    let mut groups: Vec<Vec<HistoryMessage>> = Vec::with_capacity(albums.len() + singletons.len());
    for (_, mut album) in albums {
        album.sort_by_key(|m| m.id);
        groups.push(album);
    }
    groups.extend(singletons);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: i32, grouped_id: Option<i64>) -> HistoryMessage {
        HistoryMessage {
            id,
            grouped_id,
            text: String::new(),
            attachment: None,
        }
    }

    #[test]
    fn test_albums_precede_singletons_and_sort_by_id() {
        let groups = group_by_album(vec![
            msg(12, Some(5)),
            msg(10, Some(5)),
            msg(7, None),
            msg(11, Some(5)),
        ]);

        assert_eq!(groups.len(), 2);
        let album_ids: Vec<i32> = groups[0].iter().map(|m| m.id).collect();
        assert_eq!(album_ids, vec![10, 11, 12]);
        assert_eq!(groups[1][0].id, 7);
    }

    #[test]
    fn test_zero_grouped_id_is_a_singleton() {
        let groups = group_by_album(vec![msg(1, Some(0)), msg(2, Some(0))]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_distinct_albums_keep_first_seen_order() {
        let groups = group_by_album(vec![
            msg(3, Some(9)),
            msg(1, Some(4)),
            msg(4, Some(9)),
            msg(2, Some(4)),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].iter().map(|m| m.id).collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(groups[1].iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_by_album(Vec::new()).is_empty());
    }
}
