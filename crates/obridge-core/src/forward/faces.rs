/// Built-in system faces: `(id, preview text)`.
const SYSTEM_FACES: &[(u32, &str)] = &[
    (0, "/Surprised"),
    (1, "/Pout"),
    (2, "/Drool"),
    (3, "/Stare"),
    (4, "/Smug"),
    (5, "/Tears"),
    (6, "/Shy"),
    (7, "/Zipped"),
    (8, "/Sleep"),
    (9, "/Sob"),
    (10, "/Awkward"),
    (11, "/Angry"),
    (12, "/Tongue"),
    (13, "/Grin"),
    (14, "/Smile"),
    (15, "/Frown"),
    (16, "/Cool"),
    (21, "/Cute"),
    (23, "/Arrogant"),
    (24, "/Hungry"),
    (25, "/Sleepy"),
    (26, "/Panic"),
    (27, "/Sweat"),
    (28, "/Laugh"),
    (29, "/Leisure"),
    (30, "/Strive"),
    (31, "/Curse"),
    (32, "/Question"),
    (33, "/Shh"),
    (34, "/Dizzy"),
    (38, "/Knock"),
    (39, "/Bye"),
    (49, "/Hug"),
    (53, "/Cake"),
    (63, "/Rose"),
    (66, "/Heart"),
    (74, "/Sun"),
    (75, "/Moon"),
    (76, "/ThumbsUp"),
    (77, "/ThumbsDown"),
    (78, "/Handshake"),
    (79, "/Victory"),
    (124, "/OK"),
    (178, "/SideGrin"),
    (179, "/Doge"),
    (277, "/Woof"),
];

/// Preview text for a face id; unknown faces contribute nothing.
pub fn describe(id: u32) -> Option<&'static str> {
    SYSTEM_FACES
        .iter()
        .find(|(face, _)| *face == id)
        .map(|(_, text)| *text)
}
