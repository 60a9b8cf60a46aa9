use crate::value::Bencode;

pub(crate) fn encode(value: &Bencode, buffer: &mut Vec<u8>) {
    match value {
        Bencode::Int(int) => {
            buffer.push(crate::INT_START);
            buffer.extend_from_slice(int.to_string().as_bytes());
            buffer.push(crate::BEN_END);
        }
        Bencode::Bytes(bytes) => encode_bytes(bytes, buffer),
        Bencode::List(values) => {
            buffer.push(crate::LIST_START);
            for value in values {
                encode(value, buffer);
            }
            buffer.push(crate::BEN_END);
        }
        Bencode::Dict(dict) => {
            buffer.push(crate::DICT_START);
            // Entries are already sorted by key (see `Dict::insert`).
            for (key, value) in dict.iter() {
                encode_bytes(key, buffer);
                encode(value, buffer);
            }
            buffer.push(crate::BEN_END);
        }
    }
}

fn encode_bytes(bytes: &[u8], buffer: &mut Vec<u8>) {
    buffer.extend_from_slice(bytes.len().to_string().as_bytes());
    buffer.push(crate::BYTE_LEN_END);
    buffer.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use crate::value::Bencode;
    use crate::{ben_bytes, ben_int, ben_list, ben_map};

    #[test]
    fn encode_scalars() {
        assert_eq!(ben_int!(-500).encode(), b"i-500e");
        assert_eq!(ben_int!(0).encode(), b"i0e");
        assert_eq!(ben_bytes!("spam").encode(), b"4:spam");
        assert_eq!(ben_bytes!("").encode(), b"0:");
    }

    #[test]
    fn encode_dict_emits_keys_in_lexicographic_order() {
        let value = ben_map! {
            "z" => ben_int!(1),
            "a" => ben_int!(2),
            "m" => ben_list![ben_bytes!("x")]
        };

        assert_eq!(value.encode(), b"d1:ai2e1:ml1:xe1:zi1ee");
    }

    #[test]
    fn well_formed_input_round_trips_byte_for_byte() {
        /* cSpell:disable */
        let wire = b"d4:infod5:filesld6:lengthi2e4:pathl1:a1:beee4:name1:n12:piece lengthi16384eee";
        /* cSpell:enable */

        let decoded = Bencode::decode(wire).unwrap();

        assert_eq!(decoded.encode(), wire.to_vec());
    }
}
