use std::collections::HashMap;

use export_host_domain::{AlbumRecord, ImageId, ImageRecord};

use crate::ApplicationError;

/// Immutable view of the images and albums an export session works on.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    images: Vec<ImageRecord>,
    albums: Vec<AlbumRecord>,
    /// image id -> (album index, position in album)
    memberships: HashMap<ImageId, Vec<(usize, usize)>>,
}

impl SessionSnapshot {
    pub fn new(images: Vec<ImageRecord>, albums: Vec<AlbumRecord>) -> Self {
        let mut memberships: HashMap<ImageId, Vec<(usize, usize)>> = HashMap::new();
        for (album_index, album) in albums.iter().enumerate() {
            for (position, image_id) in album.image_ids.iter().enumerate() {
                memberships
                    .entry(*image_id)
                    .or_default()
                    .push((album_index, position));
            }
        }
        Self {
            images,
            albums,
            memberships,
        }
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn albums(&self) -> &[AlbumRecord] {
        &self.albums
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }

    pub fn image(&self, index: usize) -> Result<&ImageRecord, ApplicationError> {
        self.images
            .get(index)
            .ok_or(ApplicationError::IndexOutOfRange {
                index,
                count: self.images.len(),
            })
    }

    pub fn album(&self, index: usize) -> Result<&AlbumRecord, ApplicationError> {
        self.albums
            .get(index)
            .ok_or(ApplicationError::IndexOutOfRange {
                index,
                count: self.albums.len(),
            })
    }

    pub fn albums_of(&self, index: usize) -> Result<Vec<String>, ApplicationError> {
        let image = self.image(index)?;
        Ok(self
            .memberships
            .get(&image.id)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(album_index, _)| self.albums[*album_index].name.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn position_in_album(
        &self,
        index: usize,
        album: usize,
    ) -> Result<Option<usize>, ApplicationError> {
        let image = self.image(index)?;
        self.album(album)?;
        Ok(self.memberships.get(&image.id).and_then(|entries| {
            entries
                .iter()
                .find(|(album_index, _)| *album_index == album)
                .map(|(_, position)| *position)
        }))
    }
}
