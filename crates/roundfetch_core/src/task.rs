use crate::{Phase, TaskError};

/// Two-phase URL lifecycle for one caller invocation.
///
/// A task hands out its main round of URLs, collects one result per URL into
/// write-once slots, optionally collects extra (pagination) URLs tied to an
/// already-filled slot, hands those out as a second round, and finally yields
/// the results in the original URL order once every slot is filled.
#[derive(Debug, Clone)]
pub struct Task<T> {
    phase: Phase,
    urls: Vec<String>,
    extra_urls: Vec<String>,
    slots: Vec<Option<T>>,
    /// `origin_of[j]` is the slot that `extra_urls[j]` augments.
    origin_of: Vec<usize>,
}

impl<T> Task<T> {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: Vec<String> = urls.into_iter().map(Into::into).collect();
        let slots = urls.iter().map(|_| None).collect();
        Self {
            phase: Phase::Init,
            urls,
            extra_urls: Vec::new(),
            slots,
            origin_of: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of result slots (one per original URL).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn extra_urls(&self) -> &[String] {
        &self.extra_urls
    }

    /// Advances the phase and returns the URLs of the round that just began.
    ///
    /// The first call returns the main URLs, the second the extra URLs; any
    /// further call is a phase error.
    pub fn get_urls(&mut self) -> Result<Vec<String>, TaskError> {
        let next = self.phase.next().ok_or(TaskError::Phase {
            operation: "get_urls",
            phase: self.phase,
        })?;
        self.phase = next;
        Ok(match next {
            Phase::Main => self.urls.clone(),
            _ => self.extra_urls.clone(),
        })
    }

    /// Stores the result for slot `index`. Slots are write-once.
    pub fn set_slot(&mut self, index: usize, value: T) -> Result<(), TaskError> {
        if self.phase >= Phase::Extra {
            return Err(TaskError::Phase {
                operation: "set_slot",
                phase: self.phase,
            });
        }
        let len = self.slots.len();
        let phase = self.phase;
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(TaskError::IndexOutOfRange { index, len, phase })?;
        if slot.is_some() {
            return Err(TaskError::SlotAlreadySet { index });
        }
        *slot = Some(value);
        Ok(())
    }

    /// Returns the result addressed by `index`.
    ///
    /// In the extra phase `index` is a position in the extra URLs and resolves
    /// to the slot that URL augments; otherwise it addresses a slot directly.
    pub fn get_slot(&self, index: usize) -> Result<&T, TaskError> {
        let slot = self.resolve(index)?;
        self.slots[slot]
            .as_ref()
            .ok_or(TaskError::SlotUnset { index: slot })
    }

    /// Mutable variant of [`Task::get_slot`], used to merge extra pages.
    pub fn get_slot_mut(&mut self, index: usize) -> Result<&mut T, TaskError> {
        let slot = self.resolve(index)?;
        self.slots[slot]
            .as_mut()
            .ok_or(TaskError::SlotUnset { index: slot })
    }

    /// Whether the slot addressed by `index` (see [`Task::get_slot`]) is set.
    pub fn is_slot_set(&self, index: usize) -> Result<bool, TaskError> {
        let slot = self.resolve(index)?;
        Ok(self.slots[slot].is_some())
    }

    /// Queues extra URLs that augment the already-filled slot `for_index`.
    pub fn add_extra_urls<I, S>(&mut self, urls: I, for_index: usize) -> Result<(), TaskError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.phase > Phase::Main {
            return Err(TaskError::Phase {
                operation: "add_extra_urls",
                phase: self.phase,
            });
        }
        match self.slots.get(for_index) {
            None => {
                return Err(TaskError::IndexOutOfRange {
                    index: for_index,
                    len: self.slots.len(),
                    phase: self.phase,
                })
            }
            Some(None) => return Err(TaskError::SlotUnset { index: for_index }),
            Some(Some(_)) => {}
        }
        for url in urls {
            self.extra_urls.push(url.into());
            self.origin_of.push(for_index);
        }
        Ok(())
    }

    pub fn has_extra_urls(&self) -> bool {
        !self.extra_urls.is_empty()
    }

    /// Consumes the task and returns every result in original URL order.
    pub fn into_results(self) -> Result<Vec<T>, TaskError> {
        let missing = self.missing();
        if missing != 0 {
            return Err(TaskError::ResultsIncomplete { missing });
        }
        Ok(self.slots.into_iter().flatten().collect())
    }

    fn missing(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    fn resolve(&self, index: usize) -> Result<usize, TaskError> {
        let (len, target) = if self.phase == Phase::Extra {
            (self.origin_of.len(), self.origin_of.get(index).copied())
        } else {
            (self.slots.len(), (index < self.slots.len()).then_some(index))
        };
        target.ok_or(TaskError::IndexOutOfRange {
            index,
            len,
            phase: self.phase,
        })
    }
}

impl<T: Clone> Task<T> {
    /// Returns every result in original URL order without consuming the task.
    pub fn get_results(&self) -> Result<Vec<T>, TaskError> {
        let missing = self.missing();
        if missing != 0 {
            return Err(TaskError::ResultsIncomplete { missing });
        }
        Ok(self.slots.iter().flatten().cloned().collect())
    }
}
