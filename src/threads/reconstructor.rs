use std::collections::HashMap;

use log::debug;

use crate::date_range::DateRange;
use crate::email::Message;

/// Associe les messages reçus aux réponses du dossier des envoyés.
///
/// Les messages sont stockés dans l'ordre d'arrivée ; les renvois passent
/// par `index`, jamais par des pointeurs.
pub struct ThreadReconstructor {
    range: DateRange,
    messages: Vec<Message>,
    index: HashMap<String, usize>,
}

impl ThreadReconstructor {
    pub fn new(range: DateRange) -> Self {
        ThreadReconstructor {
            range,
            messages: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Ajoute un message reçu. Renvoie `false` s'il sort de la plage de dates.
    ///
    /// Un Message-ID répété remplace l'entrée existante sans changer sa position.
    pub fn index(&mut self, message: Message) -> bool {
        if !self.range.contains(message.timestamp) {
            debug!(
                "⛔ {} ignoré, {:?} hors des dates demandées",
                message.message_id, message.timestamp
            );
            return false;
        }

        match self.index.get(&message.message_id) {
            Some(&position) => self.messages[position] = message,
            None => {
                self.index.insert(message.message_id.clone(), self.messages.len());
                self.messages.push(message);
            }
        }
        true
    }

    /// Rattache le corps de `reply` au message auquel il répond.
    ///
    /// Seule la première réponse est conservée. Renvoie `true` si la réponse
    /// a été rattachée.
    pub fn attach_reply(&mut self, reply: &Message) -> bool {
        if !self.range.contains(reply.timestamp) {
            return false;
        }
        let Some(parent_id) = reply.in_reply_to.as_deref() else {
            return false;
        };
        let Some(&position) = self.index.get(parent_id) else {
            return false;
        };

        let parent = &mut self.messages[position];
        if parent.answer.is_some() {
            debug!("{} a déjà une réponse, {} ignorée", parent_id, reply.message_id);
            return false;
        }
        parent.answer = Some(reply.question.clone());
        true
    }

    pub fn get(&self, message_id: &str) -> Option<&Message> {
        self.index.get(message_id).map(|&position| &self.messages[position])
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// Indexe `inbox`, rattache les réponses de `sent` et renvoie les messages reçus.
pub fn reconstruct<I, S>(range: DateRange, inbox: I, sent: S) -> Vec<Message>
where
    I: IntoIterator<Item = Message>,
    S: IntoIterator<Item = Message>,
{
    let mut reconstructor = ThreadReconstructor::new(range);
    for message in inbox {
        reconstructor.index(message);
    }
    let attached = sent
        .into_iter()
        .filter(|reply| reconstructor.attach_reply(reply))
        .count();
    debug!("{} message(s) sur {} ont reçu une réponse", attached, reconstructor.len());
    reconstructor.into_messages()
}
